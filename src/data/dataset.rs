//! Immutable labeled dataset

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

/// Dataset construction errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is empty")]
    Empty,

    #[error("label length {labels} does not match feature rows {rows}")]
    LabelMismatch { rows: usize, labels: usize },
}

/// Immutable table of feature rows with a label vector
///
/// Produced by the external feature pipeline and treated as opaque columnar
/// input: the core never inspects individual feature semantics.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<f64>,
}

impl Dataset {
    /// Create a dataset from a feature matrix and row-aligned labels
    pub fn new(features: Array2<f64>, labels: Array1<f64>) -> Result<Self, DatasetError> {
        if features.nrows() == 0 {
            return Err(DatasetError::Empty);
        }
        if features.nrows() != labels.len() {
            return Err(DatasetError::LabelMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    /// Number of rows
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of feature columns
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Full feature matrix view
    #[must_use]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Full label vector view
    #[must_use]
    pub fn labels(&self) -> ArrayView1<'_, f64> {
        self.labels.view()
    }

    /// Feature rows at the given indices, in index order
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Array2<f64> {
        self.features.select(Axis(0), indices)
    }

    /// Labels at the given indices, in index order
    #[must_use]
    pub fn select_labels(&self, indices: &[usize]) -> Array1<f64> {
        self.labels.select(Axis(0), indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dataset_new() {
        let ds = Dataset::new(array![[1.0, 2.0], [3.0, 4.0]], array![0.0, 1.0]).expect("valid");
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.n_features(), 2);
    }

    #[test]
    fn test_dataset_empty_rejected() {
        let result = Dataset::new(Array2::zeros((0, 3)), Array1::zeros(0));
        assert!(matches!(result, Err(DatasetError::Empty)));
    }

    #[test]
    fn test_dataset_label_mismatch_rejected() {
        let result = Dataset::new(array![[1.0], [2.0]], array![0.0]);
        assert!(matches!(result, Err(DatasetError::LabelMismatch { rows: 2, labels: 1 })));
    }

    #[test]
    fn test_select_rows_preserves_order() {
        let ds = Dataset::new(array![[0.0], [1.0], [2.0], [3.0]], array![0.0, 1.0, 2.0, 3.0])
            .expect("valid");
        let rows = ds.select_rows(&[3, 0, 2]);
        assert_eq!(rows, array![[3.0], [0.0], [2.0]]);
        let labels = ds.select_labels(&[3, 0, 2]);
        assert_eq!(labels, array![3.0, 0.0, 2.0]);
    }
}
