//! Size factor estimation using the median of ratios method

use ndarray::{Array1, ArrayView2, Axis};

use crate::error::{BatchError, Result};

/// Method for size factor estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeFactorMethod {
    /// Median of ratios against the geometric mean of features without zeros
    Ratio,
    /// Geometric means over positive counts only, for sparse data
    PosCounts,
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Per-feature log geometric means; None for features excluded from the reference
fn log_geo_means(counts: ArrayView2<f64>, method: SizeFactorMethod) -> Vec<Option<f64>> {
    let n_samples = counts.ncols() as f64;
    counts
        .axis_iter(Axis(0))
        .map(|row| match method {
            SizeFactorMethod::Ratio => {
                if row.iter().all(|&x| x > 0.0) {
                    Some(row.iter().map(|x| x.ln()).sum::<f64>() / n_samples)
                } else {
                    None
                }
            }
            SizeFactorMethod::PosCounts => {
                // zeros contribute to the denominator but not the sum
                let positive: Vec<f64> = row.iter().filter(|&&x| x > 0.0).map(|x| x.ln()).collect();
                if positive.is_empty() {
                    None
                } else {
                    Some(positive.iter().sum::<f64>() / n_samples)
                }
            }
        })
        .collect()
}

/// Estimate one size factor per sample (column)
pub fn estimate_size_factors(counts: ArrayView2<f64>, method: SizeFactorMethod) -> Result<Array1<f64>> {
    let (n_features, n_samples) = counts.dim();
    if n_features == 0 || n_samples == 0 {
        return Err(BatchError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }

    let geo = log_geo_means(counts, method);
    if geo.iter().all(|g| g.is_none()) {
        return Err(BatchError::SizeFactorFailed {
            reason: match method {
                SizeFactorMethod::Ratio => "every feature contains at least one zero".to_string(),
                SizeFactorMethod::PosCounts => "no feature has a positive count".to_string(),
            },
        });
    }

    let mut size_factors = Array1::zeros(n_samples);
    for j in 0..n_samples {
        let mut log_ratios: Vec<f64> = geo
            .iter()
            .enumerate()
            .filter_map(|(i, g)| {
                let c = counts[[i, j]];
                g.filter(|_| c > 0.0).map(|g| c.ln() - g)
            })
            .collect();
        size_factors[j] = if log_ratios.is_empty() {
            1.0
        } else {
            median(&mut log_ratios).exp()
        };
    }

    if method == SizeFactorMethod::PosCounts {
        // scale to geometric mean 1
        let log_mean = size_factors.iter().map(|s: &f64| s.ln()).sum::<f64>() / n_samples as f64;
        size_factors.mapv_inplace(|s| s / log_mean.exp());
    }

    if size_factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(BatchError::SizeFactorFailed {
            reason: "Invalid size factors computed".to_string(),
        });
    }
    Ok(size_factors)
}

/// Median of ratios, falling back to positive-count geometric means when every feature has a zero
pub fn estimate_size_factors_auto(counts: ArrayView2<f64>) -> Result<Array1<f64>> {
    match estimate_size_factors(counts, SizeFactorMethod::Ratio) {
        Err(BatchError::SizeFactorFailed { reason }) => {
            log::warn!("Median of ratios failed ({}); using positive counts", reason);
            estimate_size_factors(counts, SizeFactorMethod::PosCounts)
        }
        other => other,
    }
}
