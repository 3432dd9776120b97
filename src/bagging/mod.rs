//! Bagged model fitting
//!
//! One bagged model = k fold trials per bag set (each trained on the k-1
//! complementary folds, predicting its held-out fold) + one full-data refit.
//! The fold models exist only to produce leak-free out-of-fold predictions;
//! the refit artifact is the one that ships in the ensemble.
//!
//! Partial failure is all-or-nothing: a bagged model with any failed fold is
//! excluded outright, because a partially covered OOF column would bias
//! ensemble selection toward the rows it over-represents.

mod coordinator;
mod oof;

pub use coordinator::{BagFailure, BaggedModel, BaggingCoordinator, BaggingError};
pub use oof::{assemble_oof_column, OofError};
