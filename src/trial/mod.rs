//! Trial execution
//!
//! A trial is one fit attempt: one configuration, one fold (or the full-data
//! refit). The runner is the error boundary of the whole engine: collaborator
//! errors, panics, and deadline overruns all become [`TrialOutcome`] values
//! inside an append-only [`TrialRecord`] and never propagate to the caller.

mod record;
mod runner;

pub use record::{Fold, TrialOutcome, TrialRecord};
pub use runner::{TrialResult, TrialRunner, TrialSpec};
