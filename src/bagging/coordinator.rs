//! Bagging coordinator

use std::time::Duration;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::FoldAssignment;
use crate::metric::MetricKind;
use crate::model::{Artifact, ModelFamily};
use crate::resource::{ReserveDenied, ResourceManager, ResourceRequest};
use crate::search::ParamMap;
use crate::trial::{Fold, TrialOutcome, TrialRecord, TrialRunner, TrialSpec};

use super::oof::{assemble_oof_column, OofError};

/// Why a bagged model was excluded
#[derive(Debug, Error)]
pub enum BaggingError {
    /// A fold trial failed or timed out; the whole bagged model is dropped
    #[error("fold {fold} of bag set {set} did not succeed: {reason}")]
    FoldFailed { set: usize, fold: usize, reason: String },

    /// The deployment refit failed after all folds succeeded
    #[error("full-data refit did not succeed: {reason}")]
    RefitFailed { reason: String },

    /// The resource manager refused a reservation mid-bag
    #[error(transparent)]
    Denied(#[from] ReserveDenied),

    /// The assembled OOF column violated the coverage invariant
    #[error(transparent)]
    Oof(#[from] OofError),
}

/// A failed bagging attempt, with the trial records it still produced
#[derive(Debug)]
pub struct BagFailure {
    pub records: Vec<TrialRecord>,
    pub error: BaggingError,
}

/// A successfully bagged model
pub struct BaggedModel {
    /// Registration id, assigned by the scheduler once the level completes
    pub id: usize,
    pub family: String,
    pub level: usize,
    pub params: ParamMap,
    /// Out-of-fold prediction column over every training row (mean across
    /// bag sets). Used only for ensemble weight selection and next-level
    /// features, never the refit artifact's own training predictions.
    pub oof: Array1<f64>,
    /// Signed score of the OOF column against the true labels
    pub score: f64,
    /// Every fold + refit trial behind this model
    pub records: Vec<TrialRecord>,
    /// Full-data refit artifact, the one deployed in the ensemble
    pub artifact: Box<dyn Artifact>,
}

impl BaggedModel {
    /// Total wall-clock fit time across all trials
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.records.iter().map(|r| r.duration).sum()
    }

    /// Largest single-trial memory reservation, in MiB
    #[must_use]
    pub fn peak_memory_mb(&self) -> u64 {
        self.records.iter().map(|r| r.reserved_memory_mb).max().unwrap_or(0)
    }
}

impl std::fmt::Debug for BaggedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaggedModel")
            .field("id", &self.id)
            .field("family", &self.family)
            .field("level", &self.level)
            .field("score", &self.score)
            .field("trials", &self.records.len())
            .finish_non_exhaustive()
    }
}

enum FoldRun {
    Denied(ReserveDenied),
    Ran(Box<crate::trial::TrialResult>),
}

/// Runs all trials behind one bagged model
pub struct BaggingCoordinator<'a> {
    resources: &'a ResourceManager,
    runner: TrialRunner,
    metric: MetricKind,
    num_bag_sets: usize,
    cpus_per_trial: usize,
    gpus_per_trial: usize,
    trial_time_limit: Option<Duration>,
}

impl<'a> BaggingCoordinator<'a> {
    #[must_use]
    pub fn new(
        resources: &'a ResourceManager,
        metric: MetricKind,
        num_bag_sets: usize,
        cpus_per_trial: usize,
        gpus_per_trial: usize,
        trial_time_limit: Option<Duration>,
    ) -> Self {
        Self {
            resources,
            runner: TrialRunner::new(metric),
            metric,
            num_bag_sets: num_bag_sets.max(1),
            cpus_per_trial,
            gpus_per_trial,
            trial_time_limit,
        }
    }

    fn request_for(
        &self,
        family: &dyn ModelFamily,
        params: &ParamMap,
        n_rows: usize,
        n_features: usize,
    ) -> ResourceRequest {
        ResourceRequest {
            cpu_slots: self.cpus_per_trial,
            memory_mb: family.memory_estimate_mb(n_rows, n_features, params),
            gpus: self.gpus_per_trial,
        }
    }

    fn trial_budget(&self) -> Duration {
        let remaining = self.resources.remaining_time();
        match self.trial_time_limit {
            Some(limit) => remaining.min(limit),
            None => remaining,
        }
    }

    /// Fit one bagged model: k fold trials per bag set, then the refit
    ///
    /// `features` is the level-augmented matrix; `labels` the full label
    /// vector. All k trials of a set run in parallel through the rayon pool,
    /// each under its own reservation.
    pub fn fit_bagged(
        &self,
        family: &dyn ModelFamily,
        params: &ParamMap,
        level: usize,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        folds: &FoldAssignment,
    ) -> Result<BaggedModel, BagFailure> {
        let k = folds.k();
        let n_rows = folds.n_rows();
        let mut records = Vec::with_capacity(self.num_bag_sets * k + 1);
        let mut set_columns: Vec<Array1<f64>> = Vec::with_capacity(self.num_bag_sets);

        for set in 0..self.num_bag_sets {
            let runs: Vec<FoldRun> = (0..k)
                .into_par_iter()
                .map(|fold| self.run_fold(family, params, level, set, fold, features, labels, folds))
                .collect();

            let mut parts: Vec<(Vec<usize>, Array1<f64>)> = Vec::with_capacity(k);
            for (fold, run) in runs.into_iter().enumerate() {
                match run {
                    FoldRun::Denied(denied) => {
                        return Err(BagFailure { records, error: denied.into() });
                    }
                    FoldRun::Ran(result) => {
                        let success = result.record.outcome.is_success();
                        let reason = result.record.outcome.failure_reason();
                        records.push(result.record);
                        if let Some(reason) = reason {
                            return Err(BagFailure {
                                records,
                                error: BaggingError::FoldFailed { set, fold, reason },
                            });
                        }
                        debug_assert!(success);
                        let predictions =
                            result.predictions.expect("successful fold trial has predictions");
                        parts.push((folds.holdout_indices(fold), predictions));
                    }
                }
            }

            let views: Vec<(Vec<usize>, ArrayView1<'_, f64>)> =
                parts.iter().map(|(idx, preds)| (idx.clone(), preds.view())).collect();
            match assemble_oof_column(n_rows, &views) {
                Ok(column) => set_columns.push(column),
                Err(err) => return Err(BagFailure { records, error: err.into() }),
            }
        }

        // Mean across bag sets
        let mut oof = Array1::zeros(n_rows);
        for column in &set_columns {
            oof += column;
        }
        oof /= set_columns.len() as f64;
        let score = self.metric.score(oof.view(), labels);

        let refit = self.run_refit(family, params, level, features, labels);
        match refit {
            Err(denied) => Err(BagFailure { records, error: denied.into() }),
            Ok(result) => {
                let reason = result.record.outcome.failure_reason();
                records.push(result.record);
                match reason {
                    Some(reason) => {
                        Err(BagFailure { records, error: BaggingError::RefitFailed { reason } })
                    }
                    None => {
                        let artifact =
                            result.artifact.expect("successful refit trial has artifact");
                        info!(
                            family = family.name(),
                            level,
                            score,
                            trials = records.len(),
                            "bagged model complete"
                        );
                        Ok(BaggedModel {
                            id: 0,
                            family: family.name().to_string(),
                            level,
                            params: params.clone(),
                            oof,
                            score,
                            records,
                            artifact,
                        })
                    }
                }
            }
        }
    }

    /// Fit one model with a single train/holdout split (bagging disabled)
    ///
    /// The trained artifact doubles as the deployable one; the "OOF" column
    /// covers only the holdout rows, so stacking on top of it is not
    /// possible without leakage.
    pub fn fit_holdout(
        &self,
        family: &dyn ModelFamily,
        params: &ParamMap,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        train_indices: &[usize],
        holdout_indices: &[usize],
    ) -> Result<BaggedModel, BagFailure> {
        let request =
            self.request_for(family, params, train_indices.len(), features.ncols());
        let allocation = match self.resources.try_reserve(request) {
            Ok(allocation) => allocation,
            Err(denied) => return Err(BagFailure { records: Vec::new(), error: denied.into() }),
        };

        let train_x = features.select(ndarray::Axis(0), train_indices);
        let train_y = labels.select(ndarray::Axis(0), train_indices);
        let eval_x = features.select(ndarray::Axis(0), holdout_indices);
        let eval_y = labels.select(ndarray::Axis(0), holdout_indices);

        let result = self.runner.run(
            TrialSpec {
                family,
                params,
                level: 0,
                fold: Fold::Oof { set: 0, fold: 0 },
                train_features: train_x.view(),
                train_labels: train_y.view(),
                eval_features: Some(eval_x.view()),
                eval_labels: Some(eval_y.view()),
                time_budget: self.trial_budget(),
            },
            &allocation,
        );
        drop(allocation);

        let reason = result.record.outcome.failure_reason();
        let score = result.record.outcome.score();
        let records = vec![result.record.clone()];
        if let Some(reason) = reason {
            return Err(BagFailure {
                records,
                error: BaggingError::FoldFailed { set: 0, fold: 0, reason },
            });
        }
        Ok(BaggedModel {
            id: 0,
            family: family.name().to_string(),
            level: 0,
            params: params.clone(),
            oof: result.predictions.expect("successful trial has predictions"),
            score: score.expect("holdout trial has a score"),
            records,
            artifact: result.artifact.expect("successful trial has artifact"),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_fold(
        &self,
        family: &dyn ModelFamily,
        params: &ParamMap,
        level: usize,
        set: usize,
        fold: usize,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
        folds: &FoldAssignment,
    ) -> FoldRun {
        let train_indices = folds.train_indices(fold);
        let holdout_indices = folds.holdout_indices(fold);

        let request = self.request_for(family, params, train_indices.len(), features.ncols());
        let allocation = match self.resources.try_reserve(request) {
            Ok(allocation) => allocation,
            Err(denied) => {
                debug!(family = family.name(), set, fold, %denied, "fold reservation denied");
                return FoldRun::Denied(denied);
            }
        };

        let train_x = features.select(ndarray::Axis(0), &train_indices);
        let train_y = labels.select(ndarray::Axis(0), &train_indices);
        let eval_x = features.select(ndarray::Axis(0), &holdout_indices);
        let eval_y = labels.select(ndarray::Axis(0), &holdout_indices);

        let result = self.runner.run(
            TrialSpec {
                family,
                params,
                level,
                fold: Fold::Oof { set, fold },
                train_features: train_x.view(),
                train_labels: train_y.view(),
                eval_features: Some(eval_x.view()),
                eval_labels: Some(eval_y.view()),
                time_budget: self.trial_budget(),
            },
            &allocation,
        );
        FoldRun::Ran(Box::new(result))
    }

    fn run_refit(
        &self,
        family: &dyn ModelFamily,
        params: &ParamMap,
        level: usize,
        features: ArrayView2<'_, f64>,
        labels: ArrayView1<'_, f64>,
    ) -> Result<crate::trial::TrialResult, ReserveDenied> {
        let request = self.request_for(family, params, features.nrows(), features.ncols());
        let allocation = self.resources.try_reserve(request)?;
        // Reborrow so both views shorten to the TrialSpec lifetime
        Ok(self.runner.run(
            TrialSpec {
                family,
                params,
                level,
                fold: Fold::FullRefit,
                train_features: features.reborrow(),
                train_labels: labels.reborrow(),
                eval_features: None,
                eval_labels: None,
                time_budget: self.trial_budget(),
            },
            &allocation,
        ))
    }
}
