//! Negative binomial GLM fitting with Iteratively Reweighted Least Squares (IRLS)

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::linalg::{invert_symmetric, solve_symmetric, weighted_crossprod};
use super::negative_binomial::{nb_log_density, nb_mean, nb_weight, MAX_BETA, MIN_MU};

/// Configurable parameters for GLM fitting
#[derive(Debug, Clone)]
pub struct GlmFitParams {
    /// Maximum IRLS iterations
    pub maxit: usize,
    /// Relative deviance change below which IRLS has converged
    pub beta_tol: f64,
    /// Ridge penalty on log2-scale coefficients
    pub ridge: f64,
}

impl Default for GlmFitParams {
    fn default() -> Self {
        Self {
            maxit: 100,
            beta_tol: 1e-8,
            ridge: 1e-6,
        }
    }
}

impl GlmFitParams {
    /// Ridge penalty for natural-log coefficients
    fn lambda(&self) -> f64 {
        let ln2 = std::f64::consts::LN_2;
        self.ridge / (ln2 * ln2)
    }
}

/// Fitted coefficients for one feature (natural log scale)
#[derive(Debug, Clone)]
pub struct FeatureFit {
    pub beta: Array1<f64>,
    /// Sandwich covariance (X'WX + L)^-1 X'WX (X'WX + L)^-1
    pub covariance: Array2<f64>,
    /// Fitted means, floored at MIN_MU
    pub mu: Array1<f64>,
    pub converged: bool,
    pub deviance: f64,
}

fn fitted_means(design: &Array2<f64>, beta: &Array1<f64>, size_factors: ArrayView1<f64>) -> Array1<f64> {
    let eta = design.dot(beta);
    Array1::from_iter(
        eta.iter()
            .zip(size_factors.iter())
            .map(|(&e, &s)| nb_mean(e, s).max(MIN_MU)),
    )
}

fn deviance(counts: ArrayView1<f64>, mu: &Array1<f64>, alpha: f64) -> f64 {
    counts
        .iter()
        .zip(mu.iter())
        .map(|(&y, &m)| -2.0 * nb_log_density(y, m, alpha))
        .sum()
}

/// Least squares start on log(normalized count + 0.1)
fn initial_beta(counts: ArrayView1<f64>, design: &Array2<f64>, size_factors: ArrayView1<f64>) -> Array1<f64> {
    let y = Array1::from_iter(
        counts
            .iter()
            .zip(size_factors.iter())
            .map(|(&c, &s)| (if s > 0.0 { c / s } else { 0.0 } + 0.1).ln()),
    );
    let xtx = design.t().dot(design);
    let beta = solve_symmetric(xtx.view(), design.t().dot(&y).view());
    if beta.iter().all(|b| b.is_finite()) {
        return beta;
    }
    let mut fallback = Array1::zeros(design.ncols());
    fallback[0] = y.mean().unwrap_or(0.0);
    fallback
}

/// Fit one feature's NB GLM at a fixed dispersion
pub fn fit_feature(
    counts: ArrayView1<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    alpha: f64,
    params: &GlmFitParams,
) -> FeatureFit {
    let n_coefs = design.ncols();
    let lambda = params.lambda();
    let mut beta = initial_beta(counts, design, size_factors);
    let mut mu = fitted_means(design, &beta, size_factors);
    let mut dev_old = 0.0f64;
    let mut converged = false;

    for iter in 0..params.maxit {
        let weights = mu.mapv(|m| nb_weight(m, alpha));
        let z = Array1::from_iter((0..counts.len()).map(|i| {
            (mu[i] / size_factors[i]).ln() + (counts[i] - mu[i]) / mu[i]
        }));

        let mut lhs = weighted_crossprod(design, weights.view());
        for j in 0..n_coefs {
            lhs[[j, j]] += lambda;
        }
        let rhs = design.t().dot(&(&weights * &z));
        let next = solve_symmetric(lhs.view(), rhs.view());

        if next.iter().any(|b| !b.is_finite() || b.abs() > MAX_BETA) {
            break;
        }
        beta = next;
        mu = fitted_means(design, &beta, size_factors);

        let dev = deviance(counts, &mu, alpha);
        let conv = (dev - dev_old).abs() / (dev.abs() + 0.1);
        if conv.is_nan() {
            break;
        }
        if iter > 0 && conv < params.beta_tol {
            converged = true;
            break;
        }
        dev_old = dev;
    }

    let weights = mu.mapv(|m| nb_weight(m, alpha));
    let xtwx = weighted_crossprod(design, weights.view());
    let mut ridged = xtwx.clone();
    for j in 0..n_coefs {
        ridged[[j, j]] += lambda;
    }
    let inv = invert_symmetric(ridged.view());
    let covariance = inv.dot(&xtwx).dot(&inv);

    FeatureFit {
        deviance: deviance(counts, &mu, alpha),
        beta,
        covariance,
        mu,
        converged,
    }
}

/// Fit every feature (rows of `counts`) in parallel at its own dispersion
pub fn fit_features(
    counts: ArrayView2<f64>,
    design: &Array2<f64>,
    size_factors: ArrayView1<f64>,
    dispersions: ArrayView1<f64>,
    params: &GlmFitParams,
) -> Vec<FeatureFit> {
    (0..counts.nrows())
        .into_par_iter()
        .map(|i| fit_feature(counts.row(i), design, size_factors, dispersions[i], params))
        .collect()
}
