//! Stack level scheduling
//!
//! Levels run strictly in order: level L models train on the original
//! features column-concatenated with the OOF predictions of every
//! successful lower-level model, in registration order. Families within a
//! level search concurrently, gated by the resource manager.

mod scheduler;

pub use scheduler::{SchedulerOutput, StackScheduler};

use ndarray::{s, Array2, ArrayView1, ArrayView2};

/// Original features with extra prediction columns appended, in order
///
/// The column layout must be identical at training and prediction time, so
/// both the scheduler and the ensemble predictor build it here.
#[must_use]
pub(crate) fn concat_columns(
    original: ArrayView2<'_, f64>,
    columns: &[ArrayView1<'_, f64>],
) -> Array2<f64> {
    let n_rows = original.nrows();
    let n_original = original.ncols();
    let mut out = Array2::zeros((n_rows, n_original + columns.len()));
    out.slice_mut(s![.., ..n_original]).assign(&original);
    for (offset, column) in columns.iter().enumerate() {
        out.column_mut(n_original + offset).assign(column);
    }
    out
}
