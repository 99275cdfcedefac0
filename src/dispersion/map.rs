//! Empirical Bayes shrinkage of gene-wise dispersions toward the trend

use ndarray::{Array1, Array2, ArrayView1};

use super::gene_wise::log_posterior;
use super::DispersionParams;
use crate::stats::{grid_maximize, mad, trigamma};

/// Width of the log-normal prior and the spread of the log residuals
///
/// Returns (prior variance, variance of log residuals). The residual variance
/// is the squared MAD of log(gene-wise) - log(trend); the prior variance removes
/// the sampling variance expected at `residual_df` and is floored at 0.25.
pub fn estimate_prior_variance(
    gene_wise: ArrayView1<f64>,
    trended: ArrayView1<f64>,
    residual_df: usize,
    min_disp: f64,
) -> (f64, f64) {
    let residuals: Vec<f64> = gene_wise
        .iter()
        .zip(trended.iter())
        .filter(|(&g, &t)| g.is_finite() && g >= min_disp * 100.0 && t > 0.0)
        .map(|(&g, &t)| g.ln() - t.ln())
        .collect();
    if residuals.is_empty() {
        return (0.25, 0.0);
    }
    let var_log_disp = mad(&residuals).powi(2);
    let expected = trigamma(residual_df.max(1) as f64 / 2.0);
    ((var_log_disp - expected).max(0.25), var_log_disp)
}

/// Maximum a posteriori dispersion for one feature
pub(crate) fn fit_map_dispersion(
    counts: ArrayView1<f64>,
    design: &Array2<f64>,
    mu: &Array1<f64>,
    trend: f64,
    prior_var: f64,
    params: &DispersionParams,
) -> f64 {
    let max_disp = params.max_disp(counts.len());
    let log_alpha = grid_maximize(
        |a| log_posterior(counts, design, mu, a, Some((trend.ln(), prior_var))),
        params.min_disp.ln(),
        max_disp.ln(),
        params.grid_points,
    );
    log_alpha.exp().clamp(params.min_disp, max_disp)
}

/// True when the gene-wise estimate sits more than `outlier_sd` residual
/// standard deviations above the trend
pub fn is_dispersion_outlier(gene_wise: f64, trend: f64, var_log_disp: f64, outlier_sd: f64) -> bool {
    gene_wise.is_finite()
        && gene_wise > 0.0
        && trend > 0.0
        && gene_wise.ln() - trend.ln() > outlier_sd * var_log_disp.sqrt()
}
