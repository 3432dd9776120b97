//! Shared stub model families for integration tests

use std::sync::Once;
use std::time::Duration;

use conjunto::search::{ParamDomain, ParamMap, SearchSpace};
use conjunto::{Artifact, CancelToken, FitError, ModelFamily};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

static INIT_LOGGING: Once = Once::new();

/// Route `RUST_LOG`-filtered traces to the test harness
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Linear model with a ridge-style shrinkage hyperparameter
pub struct RidgeArtifact {
    weights: Array1<f64>,
}

impl Artifact for RidgeArtifact {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
        features.dot(&self.weights)
    }
}

/// Per-column least squares with a `shrink` hyperparameter
///
/// Deterministic given the same rows and params, which lets the tests pin
/// down reproducibility without a real learning library.
pub struct RidgeFamily;

impl ModelFamily for RidgeFamily {
    fn name(&self) -> &str {
        "ridge"
    }

    fn search_space(&self) -> SearchSpace {
        SearchSpace::new()
            .with("shrink", ParamDomain::Uniform { low: 0.0, high: 0.5, log_scale: false })
    }

    fn memory_estimate_mb(&self, _: usize, _: usize, _: &ParamMap) -> u64 {
        1
    }

    fn fit(
        &self,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        params: &ParamMap,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Artifact>, FitError> {
        cancel.checkpoint()?;
        let shrink = params.get("shrink").and_then(|v| v.as_float()).unwrap_or(0.0);
        let n_cols = features.ncols();
        let mut weights = Array1::zeros(n_cols);
        for col in 0..n_cols {
            let column = features.index_axis(Axis(1), col);
            let denom: f64 = column.iter().map(|v| v * v).sum::<f64>() + shrink;
            if denom > 1e-12 {
                let numer: f64 = column.iter().zip(labels.iter()).map(|(x, y)| x * y).sum();
                weights[col] = numer / denom / n_cols as f64;
            }
        }
        Ok(Box::new(RidgeArtifact { weights }))
    }
}

/// Predicts the training-label mean
pub struct MeanFamily;

struct MeanArtifact(f64);

impl Artifact for MeanArtifact {
    fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
        Array1::from_elem(features.nrows(), self.0)
    }
}

impl ModelFamily for MeanFamily {
    fn name(&self) -> &str {
        "mean"
    }

    fn search_space(&self) -> SearchSpace {
        SearchSpace::new()
    }

    fn memory_estimate_mb(&self, _: usize, _: usize, _: &ParamMap) -> u64 {
        1
    }

    fn fit(
        &self,
        _features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        _params: &ParamMap,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Artifact>, FitError> {
        cancel.checkpoint()?;
        Ok(Box::new(MeanArtifact(labels.mean().unwrap_or(0.0))))
    }
}

/// Fails every fit with the same reason
pub struct FailingFamily;

impl ModelFamily for FailingFamily {
    fn name(&self) -> &str {
        "failing"
    }

    fn search_space(&self) -> SearchSpace {
        SearchSpace::new()
    }

    fn memory_estimate_mb(&self, _: usize, _: usize, _: &ParamMap) -> u64 {
        1
    }

    fn fit(
        &self,
        _: ArrayView2<'_, f64>,
        _: ArrayView1<'_, f64>,
        _: &ParamMap,
        _: &CancelToken,
    ) -> Result<Box<dyn Artifact>, FitError> {
        Err(FitError::Aborted("synthetic failure".to_string()))
    }
}

/// Sleeps past any reasonable trial budget before finishing
pub struct SlowFamily {
    pub delay: Duration,
}

impl ModelFamily for SlowFamily {
    fn name(&self) -> &str {
        "slow"
    }

    fn search_space(&self) -> SearchSpace {
        SearchSpace::new()
    }

    fn memory_estimate_mb(&self, _: usize, _: usize, _: &ParamMap) -> u64 {
        1
    }

    fn fit(
        &self,
        _features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        _params: &ParamMap,
        cancel: &CancelToken,
    ) -> Result<Box<dyn Artifact>, FitError> {
        std::thread::sleep(self.delay);
        cancel.checkpoint()?;
        Ok(Box::new(MeanArtifact(labels.mean().unwrap_or(0.0))))
    }
}
