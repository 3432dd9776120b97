//! Ensemble selection and the deployable predictor
//!
//! Greedy forward selection with replacement over the successful bagged
//! models' OOF columns (Caruana-style): each round adds the candidate whose
//! inclusion in the running average most improves the metric. Selection
//! counts become the final weights.

mod predictor;
mod selector;

pub use predictor::{EnsemblePredictor, TrainedModel};
pub use selector::{select_ensemble, Candidate, EnsembleMember};
