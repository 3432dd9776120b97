//! Conjunto: resource-budgeted AutoML orchestration
//!
//! Trains a population of model families under a shared time and resource
//! budget, using k-fold bagging for honest out-of-fold validation, optional
//! multi-level stacking, and greedy forward ensemble selection over the
//! survivors. The learning algorithms themselves are pluggable: anything
//! implementing [`model::ModelFamily`] can participate.
//!
//! ## Pipeline
//!
//! 1. [`search`] proposes hyperparameter configurations per family, with
//!    early stopping on stalled scores.
//! 2. [`bagging`] fits each configuration across k folds (all-or-nothing),
//!    assembles the out-of-fold prediction column, and refits on all rows
//!    for the deployable artifact.
//! 3. [`stack`] orders levels: each stack level trains on the original
//!    features plus every lower-level model's OOF column.
//! 4. [`ensemble`] greedily selects a weighted subset of the survivors and
//!    packages the deployable [`ensemble::EnsemblePredictor`].
//!
//! Individual trial failures, timeouts, and resource denials never abort a
//! run; only a run with zero usable models fails, as
//! [`error::AutomlError::NoViableModel`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

pub mod bagging;
pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod metric;
pub mod model;
pub mod registry;
pub mod resource;
pub mod search;
pub mod stack;
pub mod trial;

pub use config::RunConfig;
pub use data::Dataset;
pub use ensemble::{EnsembleMember, EnsemblePredictor};
pub use error::{AutomlError, FailedAttempt, Result};
pub use metric::MetricKind;
pub use model::{Artifact, CancelToken, FamilyRegistry, FitError, ModelFamily};
pub use registry::{Leaderboard, LeaderboardEntry};
pub use resource::ResourcePool;

use tracing::info;

use crate::ensemble::{select_ensemble, Candidate, TrainedModel};
use crate::resource::ResourceManager;
use crate::stack::StackScheduler;

/// Everything a finished run hands back
#[derive(Debug)]
pub struct AutomlReport {
    /// All completed models, best first
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Selected ensemble members and their weights
    pub ensemble: Vec<EnsembleMember>,
    /// Deployable predictor over the full stack
    pub predictor: EnsemblePredictor,
    /// Configurations that produced no usable model
    pub attempts: Vec<FailedAttempt>,
}

impl AutomlReport {
    /// Best single model on the leaderboard
    #[must_use]
    pub fn best_model(&self) -> Option<&LeaderboardEntry> {
        self.leaderboard.first()
    }
}

/// Run the whole pipeline: search, bag, stack, select
///
/// Trials run on a dedicated worker pool sized to the CPU budget, so
/// concurrency never exceeds what the resource manager would admit. Returns
/// an error only for an invalid configuration or a run in which every
/// attempted configuration failed.
pub fn run_automl(
    dataset: &Dataset,
    families: &FamilyRegistry,
    config: &RunConfig,
) -> Result<AutomlReport> {
    config.validate()?;
    if families.is_empty() {
        return Err(AutomlError::InvalidConfig("no model families registered".to_string()));
    }

    let resources =
        ResourceManager::new(config.resources, config.time_limit, config.min_trial_duration);
    let leaderboard = Leaderboard::new();

    let workers = (config.resources.cpu_slots / config.cpus_per_trial).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("automl-{i}"))
        .build()
        .map_err(|e| AutomlError::InvalidConfig(format!("worker pool: {e}")))?;

    info!(
        rows = dataset.n_rows(),
        features = dataset.n_features(),
        families = families.len(),
        workers,
        metric = config.metric.name(),
        "run started"
    );

    let scheduler = StackScheduler::new(config, &resources, families, &leaderboard);
    let output = pool.install(|| scheduler.run(dataset))?;

    if output.candidates.is_empty() {
        return Err(AutomlError::NoViableModel { attempts: output.attempts });
    }

    let members = {
        let selectable: Vec<Candidate<'_>> = output
            .candidates
            .iter()
            .map(|m| Candidate { model_id: m.id, oof: m.oof.view() })
            .collect();
        select_ensemble(
            &selectable,
            output.eval_labels.view(),
            config.metric,
            config.ensemble_max_iterations,
        )
    };

    let base: Vec<TrainedModel> = output
        .candidates
        .into_iter()
        .map(|m| TrainedModel { id: m.id, family: m.family, level: m.level, artifact: m.artifact })
        .collect();
    let predictor = EnsemblePredictor::new(base, members.clone());

    info!(
        models = leaderboard.len(),
        members = members.len(),
        failed_attempts = output.attempts.len(),
        "run complete"
    );

    Ok(AutomlReport {
        leaderboard: leaderboard.ranked(),
        ensemble: members,
        predictor,
        attempts: output.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{ParamMap, SearchPolicy, SearchSpace};
    use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
    use std::sync::Arc;
    use std::time::Duration;

    struct MeanArtifact(f64);

    impl Artifact for MeanArtifact {
        fn predict(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
            Array1::from_elem(features.nrows(), self.0)
        }
    }

    struct MeanFamily;

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
        ) -> std::result::Result<Box<dyn Artifact>, FitError> {
            cancel.checkpoint()?;
            Ok(Box::new(MeanArtifact(labels.mean().unwrap_or(0.0))))
        }
    }

    struct BrokenFamily;

    impl ModelFamily for BrokenFamily {
        fn name(&self) -> &str {
            "broken"
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
        ) -> std::result::Result<Box<dyn Artifact>, FitError> {
            Err(FitError::Aborted("broken by construction".to_string()))
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            num_bag_folds: 3,
            search: SearchPolicy { max_proposals: 2, patience: 2, ..SearchPolicy::default() },
            min_trial_duration: Duration::ZERO,
            ..RunConfig::default()
        }
    }

    fn dataset() -> Dataset {
        let features = Array2::from_shape_fn((24, 2), |(i, j)| (i + j) as f64);
        let labels = Array1::from_shape_fn(24, |i| i as f64);
        Dataset::new(features, labels).expect("valid")
    }

    #[test]
    fn test_run_produces_leaderboard_and_predictor() {
        let mut families = FamilyRegistry::new();
        families.register(Arc::new(MeanFamily));

        let report = run_automl(&dataset(), &families, &config()).expect("run succeeds");
        assert!(!report.leaderboard.is_empty());
        assert!(!report.ensemble.is_empty());
        let weight_sum: f64 = report.ensemble.iter().map(|m| m.weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);

        let preds = report.predictor.predict(dataset().features());
        assert_eq!(preds.len(), 24);
        assert!(preds.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_leaderboard_best_first() {
        let mut families = FamilyRegistry::new();
        families.register(Arc::new(MeanFamily));

        let report = run_automl(&dataset(), &families, &config()).expect("run succeeds");
        let best = report.best_model().expect("non-empty leaderboard").score;
        assert!(report.leaderboard.iter().all(|e| e.score <= best));
    }

    #[test]
    fn test_empty_registry_rejected() {
        let families = FamilyRegistry::new();
        let result = run_automl(&dataset(), &families, &config());
        assert!(matches!(result, Err(AutomlError::InvalidConfig(_))));
    }

    #[test]
    fn test_all_failures_report_attempts() {
        let mut families = FamilyRegistry::new();
        families.register(Arc::new(BrokenFamily));

        let result = run_automl(&dataset(), &families, &config());
        match result {
            Err(AutomlError::NoViableModel { attempts }) => {
                assert!(!attempts.is_empty());
                assert!(attempts.iter().all(|a| a.family == "broken"));
            }
            other => panic!("expected NoViableModel, got {other:?}"),
        }
    }

    #[test]
    fn test_broken_family_does_not_poison_run() {
        let mut families = FamilyRegistry::new();
        families.register(Arc::new(BrokenFamily));
        families.register(Arc::new(MeanFamily));

        let report = run_automl(&dataset(), &families, &config()).expect("run succeeds");
        assert!(report.leaderboard.iter().all(|e| e.family == "mean"));
        assert!(report.attempts.iter().any(|a| a.family == "broken"));
    }

    #[test]
    fn test_invalid_config_rejected_before_any_work() {
        let mut families = FamilyRegistry::new();
        families.register(Arc::new(MeanFamily));
        let bad = RunConfig { num_bag_folds: 1, ..config() };
        assert!(matches!(
            run_automl(&dataset(), &families, &bad),
            Err(AutomlError::InvalidConfig(_))
        ));
    }
}
