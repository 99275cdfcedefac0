//! Dispersion-mean trend: a0 + a1 / mean

use ndarray::{Array1, ArrayView1};

use crate::error::{BatchError, Result};

/// How the trend was obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendFit {
    /// Parametric fit with (asymptotic dispersion, extra-Poisson) coefficients
    Parametric { a0: f64, a1: f64 },
    /// Constant mean of the usable gene-wise estimates
    Mean(f64),
}

impl TrendFit {
    pub fn predict(&self, mean: f64) -> f64 {
        match *self {
            TrendFit::Parametric { a0, a1 } if mean > 0.0 => a0 + a1 / mean,
            TrendFit::Parametric { a0, .. } => a0,
            TrendFit::Mean(value) => value,
        }
    }
}

fn gamma_deviance(data: &[(f64, f64)], a0: f64, a1: f64) -> f64 {
    data.iter()
        .map(|&(x, y)| {
            let mu = (a0 + a1 * x).max(1e-8);
            2.0 * (-(y / mu).ln() + (y - mu) / mu)
        })
        .sum()
}

/// Gamma GLM with identity link, y ~ a0 + a1 x, solved by IRLS from `start`
fn fit_gamma_identity(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    let (mut a0, mut a1) = start;
    let mut dev_old = gamma_deviance(data, a0, a1);
    for _ in 0..25 {
        let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(x, y) in data {
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swy += w * y;
            swxx += w * x * x;
            swxy += w * x * y;
        }
        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-12 {
            return ((a0, a1), false);
        }
        a0 = (swxx * swy - swx * swxy) / det;
        a1 = (sw * swxy - swx * swy) / det;

        let dev = gamma_deviance(data, a0, a1);
        if (dev_old - dev).abs() / (dev.abs() + 0.1) < 1e-8 {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }
    ((a0, a1), false)
}

/// Iterated parametric fit, dropping points whose ratio to the current fit is
/// outside (1e-4, 15) on every round
fn fit_parametric(means: ArrayView1<f64>, dispersions: ArrayView1<f64>, min_disp: f64) -> Result<(f64, f64)> {
    let data: Vec<(f64, f64)> = means
        .iter()
        .zip(dispersions.iter())
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d >= min_disp * 100.0)
        .map(|(&m, &d)| (1.0 / m, d))
        .collect();

    let mut coefs = (0.1, 1.0);
    for _ in 0..11 {
        let old = coefs;
        let good: Vec<(f64, f64)> = data
            .iter()
            .copied()
            .filter(|&(x, y)| {
                let ratio = y / (coefs.0 + coefs.1 * x);
                ratio > 1e-4 && ratio < 15.0
            })
            .collect();
        if good.len() < 3 {
            return Err(BatchError::DispersionEstimationFailed {
                reason: format!("only {} usable points for the parametric trend", good.len()),
            });
        }

        let (next, converged) = fit_gamma_identity(&good, coefs);
        if !(next.0 > 0.0 && next.1 > 0.0) {
            return Err(BatchError::DispersionEstimationFailed {
                reason: format!(
                    "parametric trend coefficients not positive (a0={:.4}, a1={:.4})",
                    next.0, next.1
                ),
            });
        }
        coefs = next;
        let change = (coefs.0 / old.0).ln().powi(2) + (coefs.1 / old.1).ln().powi(2);
        if change < 1e-6 && converged {
            return Ok(coefs);
        }
    }
    Err(BatchError::DispersionEstimationFailed {
        reason: "parametric trend did not converge".to_string(),
    })
}

/// Fit the trend, falling back to the mean of the usable gene-wise estimates
pub fn fit_dispersion_trend(
    means: ArrayView1<f64>,
    dispersions: ArrayView1<f64>,
    min_disp: f64,
) -> Result<(TrendFit, Array1<f64>)> {
    let fit = match fit_parametric(means, dispersions, min_disp) {
        Ok((a0, a1)) => {
            log::debug!("Parametric dispersion trend: a0={:.6}, a1={:.6}", a0, a1);
            TrendFit::Parametric { a0, a1 }
        }
        Err(e) => {
            let usable: Vec<f64> = dispersions
                .iter()
                .copied()
                .filter(|d| d.is_finite() && *d >= min_disp * 100.0)
                .collect();
            let fallback = if usable.is_empty() {
                let finite: Vec<f64> = dispersions.iter().copied().filter(|d| d.is_finite()).collect();
                if finite.is_empty() {
                    return Err(BatchError::DispersionEstimationFailed {
                        reason: "no finite gene-wise dispersion estimates".to_string(),
                    });
                }
                finite.iter().sum::<f64>() / finite.len() as f64
            } else {
                usable.iter().sum::<f64>() / usable.len() as f64
            };
            log::warn!("{}; using the mean dispersion {:.6} as trend", e, fallback);
            TrendFit::Mean(fallback.max(min_disp))
        }
    };
    let trended = means.mapv(|m| fit.predict(m).max(min_disp));
    Ok((fit, trended))
}
