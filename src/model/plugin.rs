//! Model family trait and registry

use std::sync::Arc;

use ndarray::{Array1, ArrayView1, ArrayView2};
use thiserror::Error;

use crate::search::{ParamMap, SearchSpace};

use super::cancel::CancelToken;

/// Errors raised by a model collaborator's `fit`
///
/// Captured by the trial runner and converted into trial outcomes; they
/// never unwind past the runner boundary.
#[derive(Debug, Error)]
pub enum FitError {
    /// The fit aborted with a model-specific reason
    #[error("fit aborted: {0}")]
    Aborted(String),

    /// The fit observed its cancellation token and stopped
    #[error("fit cancelled at checkpoint")]
    Cancelled,
}

/// A trained model able to predict on new feature rows
///
/// Exclusively owned by the trial that produced it until handed to the
/// ensemble, which only reads.
pub trait Artifact: Send + Sync {
    /// Predict one value per feature row
    fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64>;
}

/// A pluggable learning algorithm
pub trait ModelFamily: Send + Sync {
    /// Unique family name ("gbm", "linear", ...)
    fn name(&self) -> &str;

    /// Hyperparameter search space for this family
    fn search_space(&self) -> SearchSpace;

    /// Approximate memory footprint of one fit, in MiB
    ///
    /// Used by the resource manager to size the reservation before the fit
    /// starts; an over-estimate wastes capacity, an under-estimate risks
    /// over-subscription by the collaborator.
    fn memory_estimate_mb(&self, n_rows: usize, n_features: usize, params: &ParamMap) -> u64;

    /// Whether `fit` honors cancellation checkpoints
    fn supports_cancellation(&self) -> bool {
        true
    }

    /// Fit on the given rows, checking `cancel` at periodic checkpoints
    fn fit(
        &self,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        params: &ParamMap,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Artifact>, FitError>;
}

/// Model families registered for a run, in registration order
///
/// Registration order is load-bearing: it seeds per-family RNGs and breaks
/// ensemble-selection ties, so it must be identical across reruns.
#[derive(Default)]
pub struct FamilyRegistry {
    families: Vec<Arc<dyn ModelFamily>>,
}

impl FamilyRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a family; returns its registration index
    pub fn register(&mut self, family: Arc<dyn ModelFamily>) -> usize {
        self.families.push(family);
        self.families.len() - 1
    }

    /// Number of registered families
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether no family is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Family at a registration index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<dyn ModelFamily>> {
        self.families.get(index)
    }

    /// Iterate families in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ModelFamily>> {
        self.families.iter()
    }
}

impl std::fmt::Debug for FamilyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.families.iter().map(|fam| fam.name()).collect();
        f.debug_struct("FamilyRegistry").field("families", &names).finish()
    }
}
