//! Deterministic fold partitioning
//!
//! Fold assignment is computed once per run from `(n_rows, k, seed)` and
//! shared by every bagged model, so all models in a run see identical splits.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

/// Fold partitioning errors
#[derive(Debug, Error)]
pub enum FoldError {
    #[error("num_bag_folds must be at least 2, got {0}")]
    TooFewFolds(usize),

    #[error("cannot split {rows} rows into {k} folds")]
    TooFewRows { rows: usize, k: usize },

    #[error("holdout split needs at least 2 rows, got {0}")]
    TooFewRowsForHoldout(usize),
}

/// Deterministic mapping of every row to one of `k` disjoint folds
#[derive(Debug, Clone)]
pub struct FoldAssignment {
    /// fold index per row
    folds: Vec<usize>,
    k: usize,
}

impl FoldAssignment {
    /// Assign `n_rows` rows to `k` folds by seeded shuffle
    ///
    /// Fold sizes differ by at most one row. The same `(n_rows, k, seed)`
    /// always produces the same assignment.
    pub fn new(n_rows: usize, k: usize, seed: u64) -> Result<Self, FoldError> {
        if k < 2 {
            return Err(FoldError::TooFewFolds(k));
        }
        if n_rows < k {
            return Err(FoldError::TooFewRows { rows: n_rows, k });
        }

        let mut order: Vec<usize> = (0..n_rows).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let mut folds = vec![0usize; n_rows];
        for (position, row) in order.into_iter().enumerate() {
            folds[row] = position % k;
        }
        Ok(Self { folds, k })
    }

    /// Number of folds
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of rows covered by the assignment
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.folds.len()
    }

    /// Fold index of a row
    #[must_use]
    pub fn fold_of(&self, row: usize) -> usize {
        self.folds[row]
    }

    /// Rows held out by the given fold, ascending
    #[must_use]
    pub fn holdout_indices(&self, fold: usize) -> Vec<usize> {
        self.folds
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == fold)
            .map(|(row, _)| row)
            .collect()
    }

    /// Rows trained on by the given fold (the k-1 complementary folds), ascending
    #[must_use]
    pub fn train_indices(&self, fold: usize) -> Vec<usize> {
        self.folds
            .iter()
            .enumerate()
            .filter(|(_, f)| **f != fold)
            .map(|(row, _)| row)
            .collect()
    }
}

/// Deterministic train/holdout split for runs with bagging disabled
///
/// Returns `(train_indices, holdout_indices)`, both ascending. The holdout
/// gets `ceil(n_rows * holdout_frac)` rows, at least one on each side, so
/// fewer than 2 rows cannot be split.
pub fn holdout_split(
    n_rows: usize,
    holdout_frac: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), FoldError> {
    if n_rows < 2 {
        return Err(FoldError::TooFewRowsForHoldout(n_rows));
    }
    let n_holdout = ((n_rows as f64 * holdout_frac).ceil() as usize).clamp(1, n_rows - 1);

    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut holdout: Vec<usize> = order[..n_holdout].to_vec();
    let mut train: Vec<usize> = order[n_holdout..].to_vec();
    holdout.sort_unstable();
    train.sort_unstable();
    Ok((train, holdout))
}
