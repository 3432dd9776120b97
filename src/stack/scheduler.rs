//! Stack level scheduler

use std::sync::{Arc, Mutex};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::{info, warn};

use crate::bagging::{BaggedModel, BaggingCoordinator, BaggingError};
use crate::config::RunConfig;
use crate::data::{holdout_split, Dataset, FoldAssignment};
use crate::error::{AutomlError, FailedAttempt};
use crate::model::{FamilyRegistry, ModelFamily};
use crate::registry::{Leaderboard, LeaderboardEntry};
use crate::resource::ResourceManager;
use crate::search::SearchController;

use super::concat_columns;

/// Everything the ensemble selector needs from a finished schedule
pub struct SchedulerOutput {
    /// Successful bagged models, ids assigned in registration order
    pub candidates: Vec<BaggedModel>,
    /// Labels row-aligned with every candidate's OOF column
    ///
    /// The full label vector under bagging; the holdout labels otherwise.
    pub eval_labels: Array1<f64>,
    /// Every configuration that produced no usable model
    pub attempts: Vec<FailedAttempt>,
}

/// Orders training across stack levels and families
pub struct StackScheduler<'a> {
    config: &'a RunConfig,
    resources: &'a ResourceManager,
    families: &'a FamilyRegistry,
    leaderboard: &'a Leaderboard,
}

impl<'a> StackScheduler<'a> {
    #[must_use]
    pub fn new(
        config: &'a RunConfig,
        resources: &'a ResourceManager,
        families: &'a FamilyRegistry,
        leaderboard: &'a Leaderboard,
    ) -> Self {
        Self { config, resources, families, leaderboard }
    }

    /// Run all levels to completion or deadline
    ///
    /// Never fails on trial errors; an empty level truncates stacking and
    /// keeps the lower levels.
    pub fn run(&self, dataset: &Dataset) -> Result<SchedulerOutput, AutomlError> {
        let coordinator = BaggingCoordinator::new(
            self.resources,
            self.config.metric,
            self.config.num_bag_sets,
            self.config.cpus_per_trial,
            self.config.gpus_per_trial,
            self.config.trial_time_limit,
        );
        if self.config.bagging_enabled() {
            self.run_bagged(dataset, &coordinator)
        } else {
            self.run_holdout(dataset, &coordinator)
        }
    }

    fn run_bagged(
        &self,
        dataset: &Dataset,
        coordinator: &BaggingCoordinator<'_>,
    ) -> Result<SchedulerOutput, AutomlError> {
        let folds =
            FoldAssignment::new(dataset.n_rows(), self.config.num_bag_folds, self.config.seed)
                .map_err(|e| AutomlError::InvalidConfig(e.to_string()))?;

        let mut candidates: Vec<BaggedModel> = Vec::new();
        let mut attempts: Vec<FailedAttempt> = Vec::new();

        for level in 0..=self.config.effective_stack_levels() {
            if self.resources.deadline_expired() {
                warn!(level, "deadline reached before level start");
                break;
            }

            // Level-L inputs: original features ++ OOF columns of every
            // lower-level model, registration order
            let oof_columns: Vec<ArrayView1<'_, f64>> =
                candidates.iter().map(|m| m.oof.view()).collect();
            let augmented: Array2<f64> = concat_columns(dataset.features(), &oof_columns);

            let level_models = self.run_level(
                level,
                augmented.view(),
                dataset.labels(),
                coordinator,
                &mut attempts,
                FitMode::Bagged(&folds),
            );

            if level_models.is_empty() {
                // Truncate stacking; lower levels still feed the ensemble
                warn!(level, "level produced no successful model, stopping stacking");
                break;
            }
            self.register(level_models, &mut candidates);
        }

        Ok(SchedulerOutput {
            candidates,
            eval_labels: dataset.labels().to_owned(),
            attempts,
        })
    }

    fn run_holdout(
        &self,
        dataset: &Dataset,
        coordinator: &BaggingCoordinator<'_>,
    ) -> Result<SchedulerOutput, AutomlError> {
        let (train_indices, holdout_indices) =
            holdout_split(dataset.n_rows(), self.config.holdout_frac, self.config.seed)
                .map_err(|e| AutomlError::InvalidConfig(e.to_string()))?;
        let mut candidates: Vec<BaggedModel> = Vec::new();
        let mut attempts: Vec<FailedAttempt> = Vec::new();

        let split = HoldoutSplit { train: &train_indices, holdout: &holdout_indices };
        let level_models = self.run_level(
            0,
            dataset.features(),
            dataset.labels(),
            coordinator,
            &mut attempts,
            FitMode::Holdout(split),
        );
        self.register(level_models, &mut candidates);

        Ok(SchedulerOutput {
            candidates,
            eval_labels: dataset.select_labels(&holdout_indices),
            attempts,
        })
    }

    /// Run every family's search loop for one level, concurrently
    ///
    /// Results are keyed by (family registration index, proposal index) so
    /// registration order is deterministic regardless of thread timing.
    fn run_level(
        &self,
        level: usize,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        coordinator: &BaggingCoordinator<'_>,
        attempts: &mut Vec<FailedAttempt>,
        mode: FitMode<'_>,
    ) -> Vec<BaggedModel> {
        let results: Mutex<Vec<(usize, usize, BaggedModel)>> = Mutex::new(Vec::new());
        let level_attempts: Mutex<Vec<FailedAttempt>> = Mutex::new(Vec::new());

        rayon::scope(|scope| {
            for (family_idx, family) in self.families.iter().enumerate() {
                let family = Arc::clone(family);
                let results = &results;
                let level_attempts = &level_attempts;
                scope.spawn(move |_| {
                    self.family_loop(
                        level,
                        family_idx,
                        family,
                        features,
                        labels,
                        coordinator,
                        &mode,
                        results,
                        level_attempts,
                    );
                });
            }
        });

        attempts.extend(level_attempts.into_inner().unwrap_or_else(|e| e.into_inner()));
        let mut level_models = results.into_inner().unwrap_or_else(|e| e.into_inner());
        level_models.sort_by_key(|(family_idx, proposal_idx, _)| (*family_idx, *proposal_idx));
        level_models.into_iter().map(|(_, _, model)| model).collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn family_loop(
        &self,
        level: usize,
        family_idx: usize,
        family: Arc<dyn ModelFamily>,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        coordinator: &BaggingCoordinator<'_>,
        mode: &FitMode<'_>,
        results: &Mutex<Vec<(usize, usize, BaggedModel)>>,
        attempts: &Mutex<Vec<FailedAttempt>>,
    ) {
        // Stable per-family seed so reruns propose identical sequences
        let seed = self
            .config
            .seed
            .wrapping_add((level as u64) << 20)
            .wrapping_add(family_idx as u64);
        let mut controller = SearchController::new(
            family.name(),
            family.search_space(),
            self.config.search.clone(),
            seed,
        );

        let mut proposal_idx = 0usize;
        loop {
            if self.resources.deadline_expired() {
                controller.note_resource_denied();
                break;
            }
            let Some(params) = controller.next_proposal() else {
                break;
            };

            let fit = match mode {
                FitMode::Bagged(folds) => {
                    coordinator.fit_bagged(&*family, &params, level, features, labels, folds)
                }
                FitMode::Holdout(split) => coordinator.fit_holdout(
                    &*family,
                    &params,
                    features,
                    labels,
                    split.train,
                    split.holdout,
                ),
            };

            match fit {
                Ok(model) => {
                    controller.record_success(params, model.score);
                    let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
                    results.push((family_idx, proposal_idx, model));
                }
                Err(failure) => {
                    let denied = matches!(failure.error, BaggingError::Denied(_));
                    {
                        let mut attempts = attempts.lock().unwrap_or_else(|e| e.into_inner());
                        attempts.push(FailedAttempt {
                            family: family.name().to_string(),
                            level,
                            params: params.clone(),
                            reason: failure.error.to_string(),
                        });
                    }
                    if denied {
                        // Stop scheduling, do not retry
                        controller.note_resource_denied();
                    } else {
                        controller.record_failure(params);
                    }
                }
            }
            proposal_idx += 1;
        }
        info!(
            family = family.name(),
            level,
            state = ?controller.state(),
            proposals = controller.proposals_issued(),
            best = ?controller.best_score(),
            "family search finished"
        );
    }

    /// Assign registration ids and publish leaderboard entries
    fn register(&self, level_models: Vec<BaggedModel>, candidates: &mut Vec<BaggedModel>) {
        for mut model in level_models {
            model.id = candidates.len();
            self.leaderboard.push(LeaderboardEntry {
                model_id: model.id,
                family: model.family.clone(),
                level: model.level,
                score: model.score,
                metric: self.config.metric,
                metric_value: self.config.metric.raw_value(model.score),
                fit_duration: model.total_duration(),
                peak_memory_mb: model.peak_memory_mb(),
                num_trials: model.records.len(),
                fit_order: model.id,
            });
            candidates.push(model);
        }
    }
}

#[derive(Clone, Copy)]
enum FitMode<'a> {
    Bagged(&'a FoldAssignment),
    Holdout(HoldoutSplit<'a>),
}

#[derive(Clone, Copy)]
struct HoldoutSplit<'a> {
    train: &'a [usize],
    holdout: &'a [usize],
}
