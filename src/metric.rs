//! Evaluation metrics with a uniform higher-is-better orientation
//!
//! Raw error metrics (MSE, RMSE, MAE, log loss) are negated internally via a
//! ±1 coefficient so every component compares scores with plain `>`. Reported
//! leaderboard scores keep the signed form; [`MetricKind::raw_value`] recovers
//! the metric in its natural sign for display.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Floor applied to probabilities before taking logs
const LOG_LOSS_EPS: f64 = 1e-15;

/// Supported evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// Mean squared error (regression)
    Mse,
    /// Root mean squared error (regression)
    Rmse,
    /// Mean absolute error (regression)
    Mae,
    /// Fraction of correct predictions after thresholding at 0.5 (binary)
    Accuracy,
    /// Binary cross-entropy on predicted probabilities
    LogLoss,
}

impl MetricKind {
    /// Whether larger raw values of this metric are better
    #[must_use]
    pub fn higher_is_better(self) -> bool {
        matches!(self, MetricKind::Accuracy)
    }

    /// Sign applied to the raw metric so that internal scores are
    /// uniformly higher-is-better
    #[must_use]
    pub fn coefficient(self) -> f64 {
        if self.higher_is_better() {
            1.0
        } else {
            -1.0
        }
    }

    /// Metric name as reported on the leaderboard
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Mse => "mse",
            MetricKind::Rmse => "rmse",
            MetricKind::Mae => "mae",
            MetricKind::Accuracy => "accuracy",
            MetricKind::LogLoss => "log_loss",
        }
    }

    /// Compute the raw metric value in its natural sign
    ///
    /// Predictions and labels must be row-aligned and non-empty.
    #[must_use]
    pub fn compute(self, predictions: ArrayView1<'_, f64>, labels: ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(predictions.len(), labels.len());
        let n = predictions.len() as f64;
        match self {
            MetricKind::Mse => {
                predictions
                    .iter()
                    .zip(labels.iter())
                    .map(|(p, y)| (p - y) * (p - y))
                    .sum::<f64>()
                    / n
            }
            MetricKind::Rmse => MetricKind::Mse.compute(predictions, labels).sqrt(),
            MetricKind::Mae => {
                predictions.iter().zip(labels.iter()).map(|(p, y)| (p - y).abs()).sum::<f64>() / n
            }
            MetricKind::Accuracy => {
                let correct = predictions
                    .iter()
                    .zip(labels.iter())
                    .filter(|(p, y)| (**p >= 0.5) == (**y >= 0.5))
                    .count();
                correct as f64 / n
            }
            MetricKind::LogLoss => {
                predictions
                    .iter()
                    .zip(labels.iter())
                    .map(|(p, y)| {
                        let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
                        -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
                    })
                    .sum::<f64>()
                    / n
            }
        }
    }

    /// Signed score: `coefficient * raw`, so higher is always better
    #[must_use]
    pub fn score(self, predictions: ArrayView1<'_, f64>, labels: ArrayView1<'_, f64>) -> f64 {
        self.coefficient() * self.compute(predictions, labels)
    }

    /// Convert a signed score back to the metric's natural sign
    #[must_use]
    pub fn raw_value(self, score: f64) -> f64 {
        self.coefficient() * score
    }
}
