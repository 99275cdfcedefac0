//! Benjamini-Hochberg false discovery rate adjustment

use std::cmp::Ordering;

/// Benjamini-Hochberg adjusted p-values.
///
/// NaN p-values are excluded from the number of tests and stay NaN.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..pvalues.len()).filter(|&i| pvalues[i].is_finite()).collect();
    let m = order.len();
    let mut padj = vec![f64::NAN; pvalues.len()];
    if m == 0 {
        return padj;
    }
    order.sort_by(|&a, &b| pvalues[a].partial_cmp(&pvalues[b]).unwrap_or(Ordering::Equal));

    let mut running_min = 1.0f64;
    for (rank, &i) in order.iter().enumerate().rev() {
        let adj = pvalues[i] * m as f64 / (rank + 1) as f64;
        running_min = running_min.min(adj);
        padj[i] = running_min;
    }
    padj
}
