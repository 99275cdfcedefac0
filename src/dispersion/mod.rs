//! Dispersion estimation for negative binomial models

mod gene_wise;
mod map;
mod trend;

pub use map::{estimate_prior_variance, is_dispersion_outlier};
pub use trend::{fit_dispersion_trend, TrendFit};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::error::Result;
use crate::glm::GlmFitParams;

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone)]
pub struct DispersionParams {
    /// Lower bound for any dispersion estimate
    pub min_disp: f64,
    /// Points per grid pass when maximizing the adjusted likelihood
    pub grid_points: usize,
    /// Gene-wise estimates this many residual SDs above the trend are not shrunk
    pub outlier_sd: f64,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            grid_points: 20,
            outlier_sd: 2.0,
        }
    }
}

impl DispersionParams {
    /// Upper bound: max(number of samples, 10)
    pub fn max_disp(&self, n_samples: usize) -> f64 {
        (n_samples as f64).max(10.0)
    }
}

/// All dispersion estimates for one fitted subset
#[derive(Debug, Clone)]
pub struct DispersionEstimates {
    pub gene_wise: Array1<f64>,
    pub trended: Array1<f64>,
    /// Final values used for testing (MAP, or gene-wise for outliers); NaN for all-zero features
    pub final_estimates: Array1<f64>,
    pub trend: TrendFit,
    pub prior_var: f64,
    pub outliers: Vec<bool>,
}

/// Gene-wise estimates, trend, then MAP shrinkage toward the trend
pub fn estimate_dispersions(
    counts: ArrayView2<f64>,
    normalized: ArrayView2<f64>,
    size_factors: ArrayView1<f64>,
    base_means: ArrayView1<f64>,
    design: &Array2<f64>,
    params: &DispersionParams,
    glm_params: &GlmFitParams,
) -> Result<DispersionEstimates> {
    let n_features = counts.nrows();
    let xim = size_factors.mapv(|s| 1.0 / s).mean().unwrap_or(1.0);

    let gene_fits: Vec<(f64, Array1<f64>)> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            gene_wise::estimate_gene_dispersion(
                counts.row(i),
                normalized.row(i),
                size_factors,
                design,
                xim,
                params,
                glm_params,
            )
        })
        .collect();
    let gene_wise = Array1::from_iter(gene_fits.iter().map(|(a, _)| *a));

    let (trend, trended) = fit_dispersion_trend(base_means, gene_wise.view(), params.min_disp)?;

    let residual_df = design.nrows().saturating_sub(design.ncols());
    let (prior_var, var_log_disp) =
        estimate_prior_variance(gene_wise.view(), trended.view(), residual_df, params.min_disp);
    log::debug!(
        "Dispersion prior variance {:.4} (log residual variance {:.4})",
        prior_var,
        var_log_disp
    );

    let outliers: Vec<bool> = gene_wise
        .iter()
        .zip(trended.iter())
        .map(|(&g, &t)| is_dispersion_outlier(g, t, var_log_disp, params.outlier_sd))
        .collect();

    let final_estimates: Vec<f64> = (0..n_features)
        .into_par_iter()
        .map(|i| {
            let (gene, mu) = &gene_fits[i];
            if gene.is_nan() {
                f64::NAN
            } else if outliers[i] {
                *gene
            } else {
                map::fit_map_dispersion(counts.row(i), design, mu, trended[i], prior_var, params)
            }
        })
        .collect();

    let n_outliers = outliers.iter().filter(|&&o| o).count();
    if n_outliers > 0 {
        log::debug!("{} dispersion outliers kept at their gene-wise estimate", n_outliers);
    }

    Ok(DispersionEstimates {
        gene_wise,
        trended,
        final_estimates: Array1::from(final_estimates),
        trend,
        prior_var,
        outliers,
    })
}
