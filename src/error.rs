//! Run-level error types
//!
//! Per-trial failures never surface here: they are captured as
//! [`TrialOutcome`](crate::trial::TrialOutcome) values inside trial records
//! and pattern-matched by the scheduler. Only a run that produces zero
//! usable models fails as a whole.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::ParamMap;

/// One configuration that was attempted but produced no usable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAttempt {
    /// Model family name
    pub family: String,
    /// Stack level the configuration was scheduled at
    pub level: usize,
    /// Hyperparameter configuration
    pub params: ParamMap,
    /// Failure reason (fit error, timeout, fold inconsistency, denial)
    pub reason: String,
}

/// Run-level errors
#[derive(Debug, Error)]
pub enum AutomlError {
    /// Every attempted configuration failed; the run has nothing to deploy
    #[error("no viable model: all {} attempted configurations failed", attempts.len())]
    NoViableModel {
        /// Every configuration tried, with its failure reason
        attempts: Vec<FailedAttempt>,
    },

    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for run-level operations
pub type Result<T> = std::result::Result<T, AutomlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ParamMap;

    #[test]
    fn test_no_viable_model_display_counts_attempts() {
        let err = AutomlError::NoViableModel {
            attempts: vec![
                FailedAttempt {
                    family: "gbm".to_string(),
                    level: 0,
                    params: ParamMap::new(),
                    reason: "fit aborted: singular matrix".to_string(),
                },
                FailedAttempt {
                    family: "gbm".to_string(),
                    level: 0,
                    params: ParamMap::new(),
                    reason: "timed out".to_string(),
                },
            ],
        };
        let msg = format!("{err}");
        assert!(msg.contains("no viable model"));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = AutomlError::InvalidConfig("num_bag_folds must be 0 or >= 2".to_string());
        assert!(format!("{err}").contains("num_bag_folds"));
    }

    #[test]
    fn test_failed_attempt_roundtrip() {
        let attempt = FailedAttempt {
            family: "linear".to_string(),
            level: 1,
            params: ParamMap::new(),
            reason: "fold 3 failed".to_string(),
        };
        let json = serde_json::to_string(&attempt).expect("serialize");
        let back: FailedAttempt = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.family, "linear");
        assert_eq!(back.level, 1);
    }
}
