//! Run-level configuration
//!
//! Read once at run start and treated as immutable for the run's duration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AutomlError;
use crate::metric::MetricKind;
use crate::resource::ResourcePool;
use crate::search::SearchPolicy;

/// Options the orchestration core honors for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Wall-clock deadline for the whole run
    pub time_limit: Duration,
    /// Bagging folds k; 0 disables bagging (holdout mode)
    pub num_bag_folds: usize,
    /// Repeated bagging rounds for variance reduction
    pub num_bag_sets: usize,
    /// Stack levels above level 0 (0 = no stacking)
    pub num_stack_levels: usize,
    /// Holdout fraction, used only when bagging is disabled
    pub holdout_frac: f64,
    /// Resource budget
    pub resources: ResourcePool,
    /// CPU slots reserved per trial
    pub cpus_per_trial: usize,
    /// GPUs reserved per trial
    pub gpus_per_trial: usize,
    /// Below this much remaining time, no new trials are scheduled
    pub min_trial_duration: Duration,
    /// Optional per-trial time cap (otherwise remaining run time)
    pub trial_time_limit: Option<Duration>,
    /// Evaluation metric
    pub metric: MetricKind,
    /// Seed for fold assignment and hyperparameter sampling
    pub seed: u64,
    /// Hyperparameter search knobs
    pub search: SearchPolicy,
    /// Greedy ensemble selection iteration cap
    pub ensemble_max_iterations: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(3600),
            num_bag_folds: 5,
            num_bag_sets: 1,
            num_stack_levels: 1,
            holdout_frac: 0.2,
            resources: ResourcePool::default(),
            cpus_per_trial: 1,
            gpus_per_trial: 0,
            min_trial_duration: Duration::from_millis(100),
            trial_time_limit: None,
            metric: MetricKind::Mse,
            seed: 42,
            search: SearchPolicy::default(),
            ensemble_max_iterations: 100,
        }
    }
}

impl RunConfig {
    /// Whether bagging (and therefore stacking) is enabled
    #[must_use]
    pub fn bagging_enabled(&self) -> bool {
        self.num_bag_folds > 0
    }

    /// Number of stack levels actually run
    ///
    /// Stacking needs full-coverage OOF columns, so holdout mode caps the
    /// run at level 0.
    #[must_use]
    pub fn effective_stack_levels(&self) -> usize {
        if self.bagging_enabled() {
            self.num_stack_levels
        } else {
            0
        }
    }

    /// Validate option combinations
    pub fn validate(&self) -> Result<(), AutomlError> {
        if self.num_bag_folds == 1 {
            return Err(AutomlError::InvalidConfig(
                "num_bag_folds must be 0 (holdout) or at least 2".to_string(),
            ));
        }
        if self.num_bag_sets == 0 {
            return Err(AutomlError::InvalidConfig("num_bag_sets must be at least 1".to_string()));
        }
        if !self.bagging_enabled() && !(0.0..1.0).contains(&self.holdout_frac) {
            return Err(AutomlError::InvalidConfig(format!(
                "holdout_frac must be in (0, 1), got {}",
                self.holdout_frac
            )));
        }
        if self.cpus_per_trial == 0 || self.cpus_per_trial > self.resources.cpu_slots {
            return Err(AutomlError::InvalidConfig(format!(
                "cpus_per_trial must be in 1..={}, got {}",
                self.resources.cpu_slots, self.cpus_per_trial
            )));
        }
        if self.gpus_per_trial > self.resources.gpus {
            return Err(AutomlError::InvalidConfig(format!(
                "gpus_per_trial {} exceeds gpu budget {}",
                self.gpus_per_trial, self.resources.gpus
            )));
        }
        if self.ensemble_max_iterations == 0 {
            return Err(AutomlError::InvalidConfig(
                "ensemble_max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
