//! Trial runner: the error boundary around collaborator fits

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::Utc;
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::{debug, warn};

use crate::metric::MetricKind;
use crate::model::{Artifact, CancelToken, FitError, ModelFamily};
use crate::resource::Allocation;
use crate::search::ParamMap;

use super::record::{Fold, TrialOutcome, TrialRecord};

/// Everything one trial needs
pub struct TrialSpec<'a> {
    pub family: &'a dyn ModelFamily,
    pub params: &'a ParamMap,
    pub level: usize,
    pub fold: Fold,
    pub train_features: ArrayView2<'a, f64>,
    pub train_labels: ArrayView1<'a, f64>,
    /// Held-out rows to score on; absent for the full refit
    pub eval_features: Option<ArrayView2<'a, f64>>,
    pub eval_labels: Option<ArrayView1<'a, f64>>,
    /// Per-trial wall-clock budget
    pub time_budget: Duration,
}

/// Record plus the artifacts the record cannot serialize
pub struct TrialResult {
    pub record: TrialRecord,
    /// Trained model, present only on success
    pub artifact: Option<Box<dyn Artifact>>,
    /// Held-out predictions, present only on success with eval rows
    pub predictions: Option<Array1<f64>>,
}

/// Executes single trials under an allocation
#[derive(Debug, Clone, Copy)]
pub struct TrialRunner {
    metric: MetricKind,
}

impl TrialRunner {
    #[must_use]
    pub fn new(metric: MetricKind) -> Self {
        Self { metric }
    }

    /// Run one trial to completion
    ///
    /// Never returns an error: collaborator failures, panics, and deadline
    /// overruns are folded into the record's outcome. The allocation is only
    /// held by the caller for the duration of this call; its reserved
    /// amounts are copied into the record.
    pub fn run(&self, spec: TrialSpec<'_>, allocation: &Allocation<'_>) -> TrialResult {
        let started_at = Utc::now();
        let started = Instant::now();
        // Families that ignore checkpoints get an inert token; the post-hoc
        // overrun check below is their only timeout guard.
        let cancel = if spec.family.supports_cancellation() {
            CancelToken::new(Some(started + spec.time_budget))
        } else {
            CancelToken::unbounded()
        };

        let fit = catch_unwind(AssertUnwindSafe(|| {
            spec.family.fit(spec.train_features, spec.train_labels, spec.params, &cancel)
        }));
        let elapsed = started.elapsed();

        let request = allocation.request();
        let mut record = TrialRecord {
            family: spec.family.name().to_string(),
            level: spec.level,
            params: spec.params.clone(),
            fold: spec.fold,
            started_at,
            duration: elapsed,
            cpu_slots: request.cpu_slots,
            reserved_memory_mb: request.memory_mb,
            outcome: TrialOutcome::TimedOut,
        };

        let artifact = match fit {
            Err(panic) => {
                let reason = panic_reason(&*panic);
                warn!(family = %record.family, %reason, "trial panicked");
                record.outcome = TrialOutcome::Failed { reason: format!("panicked: {reason}") };
                return TrialResult { record, artifact: None, predictions: None };
            }
            Ok(Err(FitError::Cancelled)) => {
                debug!(family = %record.family, ?spec.fold, "trial cancelled at checkpoint");
                record.outcome = TrialOutcome::TimedOut;
                return TrialResult { record, artifact: None, predictions: None };
            }
            Ok(Err(err)) => {
                debug!(family = %record.family, %err, "trial failed");
                record.outcome = TrialOutcome::Failed { reason: err.to_string() };
                return TrialResult { record, artifact: None, predictions: None };
            }
            Ok(Ok(artifact)) => artifact,
        };

        // A fit that ignored its checkpoints and overran the budget is
        // forcibly marked timed out; its artifact is discarded.
        if elapsed > spec.time_budget {
            warn!(family = %record.family, ?elapsed, "trial overran its time budget");
            record.outcome = TrialOutcome::TimedOut;
            return TrialResult { record, artifact: None, predictions: None };
        }

        let (score, predictions) = match (spec.eval_features, spec.eval_labels) {
            (Some(features), Some(labels)) => {
                let predicted = catch_unwind(AssertUnwindSafe(|| artifact.predict(features)));
                match predicted {
                    Ok(preds) => {
                        let score = self.metric.score(preds.view(), labels);
                        (Some(score), Some(preds))
                    }
                    Err(panic) => {
                        let reason = panic_reason(&*panic);
                        record.outcome =
                            TrialOutcome::Failed { reason: format!("predict panicked: {reason}") };
                        return TrialResult { record, artifact: None, predictions: None };
                    }
                }
            }
            _ => (None, None),
        };

        record.duration = started.elapsed();
        record.outcome = TrialOutcome::Succeeded { score };
        TrialResult { record, artifact: Some(artifact), predictions }
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
