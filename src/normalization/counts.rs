//! Normalized counts and per-feature mean abundance

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{BatchError, Result};

/// Counts divided by each sample's size factor
pub fn normalized_counts(counts: ArrayView2<f64>, size_factors: ArrayView1<f64>) -> Result<Array2<f64>> {
    if size_factors.len() != counts.ncols() {
        return Err(BatchError::DimensionMismatch {
            expected: format!("{} size factors", counts.ncols()),
            got: format!("{} size factors", size_factors.len()),
        });
    }
    Ok(&counts / &size_factors.insert_axis(Axis(0)))
}

/// Row means of the normalized counts (baseMean)
pub fn base_means(normalized: ArrayView2<f64>) -> Array1<f64> {
    normalized
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(normalized.nrows()))
}
