//! Cooperative cancellation for in-flight fits

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::plugin::FitError;

/// Cancellation token checked by model fits at their own checkpoints
///
/// Trips either explicitly via [`CancelToken::cancel`] (global deadline
/// signal) or implicitly once the per-trial deadline passes. Cloning shares
/// the same flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token with an optional per-trial deadline
    #[must_use]
    pub fn new(deadline: Option<Instant>) -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), deadline }
    }

    /// Token that never trips on its own
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Signal cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested or the deadline has passed
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Checkpoint for model fits: returns `FitError::Cancelled` once tripped
    ///
    /// Collaborators call this periodically inside `fit`.
    pub fn checkpoint(&self) -> Result<(), FitError> {
        if self.is_cancelled() {
            Err(FitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unbounded_token_never_trips() {
        let token = CancelToken::unbounded();
        assert!(!token.is_cancelled());
        assert!(token.checkpoint().is_ok());
    }

    #[test]
    fn test_explicit_cancel_trips() {
        let token = CancelToken::unbounded();
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.checkpoint(), Err(FitError::Cancelled)));
    }

    #[test]
    fn test_clone_shares_flag() {
        let token = CancelToken::unbounded();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_passed_deadline_trips() {
        let token = CancelToken::new(Some(Instant::now() - Duration::from_millis(1)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_future_deadline_does_not_trip() {
        let token = CancelToken::new(Some(Instant::now() + Duration::from_secs(3600)));
        assert!(!token.is_cancelled());
    }
}
