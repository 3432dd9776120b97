//! Out-of-fold prediction assembly

use ndarray::{Array1, ArrayView1};
use thiserror::Error;

/// OOF coverage violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OofError {
    #[error("row {0} predicted by more than one fold")]
    RowCoveredTwice(usize),

    #[error("{0} rows received no out-of-fold prediction")]
    RowsUncovered(usize),

    #[error("fold produced {got} predictions for {expected} held-out rows")]
    LengthMismatch { expected: usize, got: usize },
}

/// Assemble one bag set's OOF column from per-fold holdout predictions
///
/// `parts` pairs each fold's held-out row indices with that fold model's
/// predictions. Enforces the coverage invariant: every row exactly once,
/// and only ever from the fold that held it out.
pub fn assemble_oof_column(
    n_rows: usize,
    parts: &[(Vec<usize>, ArrayView1<'_, f64>)],
) -> Result<Array1<f64>, OofError> {
    let mut column = Array1::zeros(n_rows);
    let mut covered = vec![false; n_rows];

    for (indices, predictions) in parts {
        if indices.len() != predictions.len() {
            return Err(OofError::LengthMismatch {
                expected: indices.len(),
                got: predictions.len(),
            });
        }
        for (&row, &value) in indices.iter().zip(predictions.iter()) {
            if covered[row] {
                return Err(OofError::RowCoveredTwice(row));
            }
            covered[row] = true;
            column[row] = value;
        }
    }

    let uncovered = covered.iter().filter(|c| !**c).count();
    if uncovered > 0 {
        return Err(OofError::RowsUncovered(uncovered));
    }
    Ok(column)
}
