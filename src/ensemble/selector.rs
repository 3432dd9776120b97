//! Greedy forward ensemble selection

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metric::MetricKind;

/// One distinct model in the final ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    /// Registration id of the bagged model
    pub model_id: usize,
    /// Non-negative weight; weights sum to 1 across the ensemble
    pub weight: f64,
}

/// A selectable model: its id and OOF prediction column
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub model_id: usize,
    pub oof: ArrayView1<'a, f64>,
}

/// Greedy forward selection with replacement
///
/// Each round evaluates every candidate appended to the current selection
/// and keeps the one with the best resulting signed score, ties broken by
/// earliest registration order (candidates are scanned in slice order).
/// Stops when no candidate strictly improves the score or `max_iterations`
/// is reached. Duplicates are allowed; the final weight of a distinct model
/// is its selection count over the total.
///
/// Returns an empty vector only when `candidates` is empty; the caller
/// treats that as a no-viable-model failure.
#[must_use]
pub fn select_ensemble(
    candidates: &[Candidate<'_>],
    labels: ArrayView1<'_, f64>,
    metric: MetricKind,
    max_iterations: usize,
) -> Vec<EnsembleMember> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let n_rows = labels.len();
    let mut running_sum = Array1::<f64>::zeros(n_rows);
    let mut counts = vec![0usize; candidates.len()];
    let mut total = 0usize;
    let mut current_score: Option<f64> = None;

    for _ in 0..max_iterations {
        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in candidates.iter().enumerate() {
            let trial = (&running_sum + &candidate.oof) / (total + 1) as f64;
            let score = metric.score(trial.view(), labels);
            // Strict > keeps the earliest candidate on ties
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }
        let (idx, score) = best.expect("candidates is non-empty");

        if let Some(current) = current_score {
            if score <= current {
                break;
            }
        }

        running_sum += &candidates[idx].oof;
        counts[idx] += 1;
        total += 1;
        current_score = Some(score);
    }

    let members: Vec<EnsembleMember> = candidates
        .iter()
        .zip(counts.iter())
        .filter(|(_, count)| **count > 0)
        .map(|(candidate, count)| EnsembleMember {
            model_id: candidate.model_id,
            weight: *count as f64 / total as f64,
        })
        .collect();
    info!(
        members = members.len(),
        iterations = total,
        score = current_score.unwrap_or(f64::NEG_INFINITY),
        "ensemble selection complete"
    );
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_empty_candidates_yield_empty_selection() {
        let labels = array![1.0, 2.0];
        let members = select_ensemble(&[], labels.view(), MetricKind::Mse, 10);
        assert!(members.is_empty());
    }

    #[test]
    fn test_single_perfect_model_takes_all_weight() {
        let labels = array![1.0, 2.0, 3.0];
        let perfect = array![1.0, 2.0, 3.0];
        let bad = array![0.0, 0.0, 0.0];
        let candidates = [
            Candidate { model_id: 0, oof: perfect.view() },
            Candidate { model_id: 1, oof: bad.view() },
        ];
        let members = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 20);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].model_id, 0);
        assert!((members[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let labels = array![0.0, 1.0, 2.0, 3.0];
        let over = array![0.5, 1.5, 2.5, 3.5];
        let under = array![-0.5, 0.5, 1.5, 2.5];
        let candidates = [
            Candidate { model_id: 0, oof: over.view() },
            Candidate { model_id: 1, oof: under.view() },
        ];
        let members = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 50);
        let sum: f64 = members.iter().map(|m| m.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(members.iter().all(|m| m.weight >= 0.0));
    }

    #[test]
    fn test_complementary_models_both_selected() {
        // Averaging the two biased models is strictly better than either
        let labels = array![0.0, 1.0, 2.0, 3.0];
        let over = array![1.0, 2.0, 3.0, 4.0];
        let under = array![-1.0, 0.0, 1.0, 2.0];
        let candidates = [
            Candidate { model_id: 3, oof: over.view() },
            Candidate { model_id: 7, oof: under.view() },
        ];
        let members = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 50);
        assert_eq!(members.len(), 2);
        let ids: Vec<usize> = members.iter().map(|m| m.model_id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn test_ties_prefer_earliest_registration() {
        let labels = array![1.0, 1.0];
        let same_a = array![0.5, 0.5];
        let same_b = array![0.5, 0.5];
        let candidates = [
            Candidate { model_id: 10, oof: same_a.view() },
            Candidate { model_id: 20, oof: same_b.view() },
        ];
        let members = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 5);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].model_id, 10);
    }

    #[test]
    fn test_iteration_cap_respected() {
        let labels = array![0.0, 1.0];
        let near = array![0.1, 0.9];
        let far = array![0.4, 0.6];
        let candidates = [
            Candidate { model_id: 0, oof: near.view() },
            Candidate { model_id: 1, oof: far.view() },
        ];
        let members = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 1);
        assert_eq!(members.len(), 1);
        assert!((members[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let labels = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let a = array![0.2, 1.1, 2.3, 2.9, 4.2];
        let b = array![-0.1, 0.8, 1.9, 3.2, 3.8];
        let c = array![0.5, 1.5, 2.5, 3.5, 4.5];
        let candidates = [
            Candidate { model_id: 0, oof: a.view() },
            Candidate { model_id: 1, oof: b.view() },
            Candidate { model_id: 2, oof: c.view() },
        ];
        let first = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 30);
        let second = select_ensemble(&candidates, labels.view(), MetricKind::Mse, 30);
        assert_eq!(first, second);
    }
}
