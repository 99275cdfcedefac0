//! Gene-wise dispersion estimates from the Cox-Reid adjusted profile likelihood

use ndarray::{Array1, Array2, ArrayView1};
use statrs::function::gamma::ln_gamma;

use super::DispersionParams;
use crate::glm::linalg::{log_det_symmetric, solve_symmetric, weighted_crossprod};
use crate::glm::{fit_feature, GlmFitParams};
use crate::stats::grid_maximize;

/// Adjusted profile log likelihood of log(alpha) at fixed means, plus an optional
/// normal prior on log(alpha) given as (mean, variance)
pub(crate) fn log_posterior(
    counts: ArrayView1<f64>,
    design: &Array2<f64>,
    mu: &Array1<f64>,
    log_alpha: f64,
    prior: Option<(f64, f64)>,
) -> f64 {
    let alpha = log_alpha.exp();
    let alpha_inv = 1.0 / alpha;

    let mut ll = 0.0;
    let mut weights = Array1::zeros(mu.len());
    for (i, (&y, &m)) in counts.iter().zip(mu.iter()).enumerate() {
        let m = m.max(1e-10);
        ll += ln_gamma(y + alpha_inv) - ln_gamma(alpha_inv)
            - y * (m + alpha_inv).ln()
            - alpha_inv * (1.0 + m * alpha).ln();
        weights[i] = 1.0 / (1.0 / m + alpha);
    }

    let cox_reid = log_det_symmetric(weighted_crossprod(design, weights.view()).view())
        .map(|d| -0.5 * d)
        .unwrap_or(0.0);

    let prior_term = prior
        .map(|(mean, var)| -0.5 * (log_alpha - mean).powi(2) / var)
        .unwrap_or(0.0);

    ll + cox_reid + prior_term
}

/// Moment estimate from least-squares group means of the normalized counts
fn rough_disp_estimate(normalized: ArrayView1<f64>, design: &Array2<f64>) -> f64 {
    let (n, p) = design.dim();
    if n <= p {
        return f64::NAN;
    }
    let xtx = design.t().dot(design);
    let beta = solve_symmetric(xtx.view(), design.t().dot(&normalized).view());
    let fitted = design.dot(&beta);
    let sum: f64 = normalized
        .iter()
        .zip(fitted.iter())
        .map(|(&y, &m)| {
            let m = m.max(1.0);
            ((y - m).powi(2) - m) / (m * m)
        })
        .sum();
    (sum / (n - p) as f64).max(0.0)
}

/// (variance - xim * mean) / mean^2 over the normalized counts
fn moments_disp_estimate(normalized: ArrayView1<f64>, xim: f64) -> f64 {
    let n = normalized.len() as f64;
    let mean = normalized.sum() / n;
    if mean <= 1e-10 || n < 2.0 {
        return f64::INFINITY;
    }
    let var = normalized.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (var - xim * mean) / (mean * mean)
}

/// Maximum adjusted likelihood dispersion for one feature.
///
/// Returns the estimate and the fitted means it was computed against. All-zero
/// features yield NaN.
pub(crate) fn estimate_gene_dispersion(
    counts: ArrayView1<f64>,
    normalized: ArrayView1<f64>,
    size_factors: ArrayView1<f64>,
    design: &Array2<f64>,
    xim: f64,
    params: &DispersionParams,
    glm_params: &GlmFitParams,
) -> (f64, Array1<f64>) {
    if counts.iter().all(|&c| c == 0.0) {
        return (f64::NAN, Array1::zeros(counts.len()));
    }

    let max_disp = params.max_disp(counts.len());
    let rough = rough_disp_estimate(normalized, design);
    let moments = moments_disp_estimate(normalized, xim);
    let alpha_init = if rough.is_nan() { moments } else { rough.min(moments) };
    let alpha_init = alpha_init.clamp(params.min_disp, max_disp);

    let mu = fit_feature(counts, design, size_factors, alpha_init, glm_params).mu;

    let log_alpha = grid_maximize(
        |a| log_posterior(counts, design, &mu, a, None),
        params.min_disp.ln(),
        max_disp.ln(),
        params.grid_points,
    );
    (log_alpha.exp().clamp(params.min_disp, max_disp), mu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn design() -> Array2<f64> {
        array![
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [1.0, 1.0],
            [1.0, 1.0],
            [1.0, 1.0]
        ]
    }

    #[test]
    fn test_noisy_feature_has_larger_dispersion() {
        let sf = Array1::ones(8);
        let params = DispersionParams::default();
        let glm = GlmFitParams::default();

        let quiet = array![100.0, 102.0, 98.0, 101.0, 200.0, 199.0, 203.0, 198.0];
        let noisy = array![40.0, 180.0, 90.0, 130.0, 90.0, 350.0, 160.0, 260.0];
        let (a_quiet, _) = estimate_gene_dispersion(quiet.view(), quiet.view(), sf.view(), &design(), 1.0, &params, &glm);
        let (a_noisy, mu) = estimate_gene_dispersion(noisy.view(), noisy.view(), sf.view(), &design(), 1.0, &params, &glm);

        assert!(a_noisy > 0.05);
        assert!(a_quiet < a_noisy);
        assert_eq!(mu.len(), 8);
    }

    #[test]
    fn test_all_zero_is_nan() {
        let sf = Array1::ones(8);
        let zeros = Array1::zeros(8);
        let (alpha, _) = estimate_gene_dispersion(
            zeros.view(),
            zeros.view(),
            sf.view(),
            &design(),
            1.0,
            &DispersionParams::default(),
            &GlmFitParams::default(),
        );
        assert!(alpha.is_nan());
    }

    #[test]
    fn test_prior_pulls_toward_mean() {
        let counts = array![40.0, 180.0, 90.0, 130.0, 90.0, 350.0, 160.0, 260.0];
        let mu = array![110.0, 110.0, 110.0, 110.0, 215.0, 215.0, 215.0, 215.0];
        let d = design();
        let free = grid_maximize(|a| log_posterior(counts.view(), &d, &mu, a, None), -10.0, 2.0, 20);
        let pulled = grid_maximize(
            |a| log_posterior(counts.view(), &d, &mu, a, Some((-5.0, 0.1))),
            -10.0,
            2.0,
            20,
        );
        assert!(pulled < free);
        assert!(pulled > -5.5);
    }
}
