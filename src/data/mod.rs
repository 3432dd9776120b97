//! Dataset and fold partitioning
//!
//! The feature pipeline is an external collaborator: this module only holds
//! the fixed numeric table it produced, plus the deterministic k-fold
//! assignment every bagged model in a run shares.

mod dataset;
mod folds;

pub use dataset::{Dataset, DatasetError};
pub use folds::{holdout_split, FoldAssignment, FoldError};
