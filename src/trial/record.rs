//! Trial records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::ParamMap;

/// Which slice of data a trial fit on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fold {
    /// Out-of-fold trial: trained on the complement of `fold` in bag `set`
    Oof { set: usize, fold: usize },
    /// Full-data refit for deployment (no validation score)
    FullRefit,
}

/// Tagged trial outcome
///
/// A tagged value rather than caught control flow, so the scheduler can
/// pattern-match on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrialOutcome {
    /// Fit and predict completed; `score` is absent for the full refit
    Succeeded { score: Option<f64> },
    /// The collaborator raised or panicked
    Failed { reason: String },
    /// The time budget elapsed before the fit finished
    TimedOut,
}

impl TrialOutcome {
    /// Whether the trial produced a usable artifact
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, TrialOutcome::Succeeded { .. })
    }

    /// Validation score, if present
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self {
            TrialOutcome::Succeeded { score } => *score,
            _ => None,
        }
    }

    /// Short human-readable failure reason, if not a success
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            TrialOutcome::Succeeded { .. } => None,
            TrialOutcome::Failed { reason } => Some(reason.clone()),
            TrialOutcome::TimedOut => Some("timed out".to_string()),
        }
    }
}

/// One fit attempt, append-only once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Model family name
    pub family: String,
    /// Stack level
    pub level: usize,
    /// Hyperparameter configuration
    pub params: ParamMap,
    /// Data slice
    pub fold: Fold,
    /// When the trial started
    pub started_at: DateTime<Utc>,
    /// Wall-clock fit+predict duration
    pub duration: Duration,
    /// CPU slots reserved for the trial
    pub cpu_slots: usize,
    /// Memory ceiling reserved for the trial, in MiB
    pub reserved_memory_mb: u64,
    /// Outcome
    pub outcome: TrialOutcome,
}
