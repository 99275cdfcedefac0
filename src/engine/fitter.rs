//! Contrast fitting on one subset

use ndarray::Array1;

use crate::data::{CountMatrix, SubsetDataset};
use crate::dispersion::{estimate_dispersions, DispersionParams};
use crate::error::{BatchError, Result};
use crate::filter::independent_filtering;
use crate::glm::{fit_features, GlmFitParams};
use crate::io::FeatureRecord;
use crate::model::{build_design, Design, ModelFormula};
use crate::normalization::{base_means, estimate_size_factors_auto, normalized_counts};
use crate::testing::{benjamini_hochberg, wald_test, WaldParams, WaldStatistic};

/// Numeric procedure that turns counts, a design and a contrast vector into
/// one record per feature, in feature order
pub trait ContrastEngine: Send + Sync {
    fn fit(&self, counts: &CountMatrix, design: &Design, contrast: &Array1<f64>) -> Result<Vec<FeatureRecord>>;
}

/// Negative binomial GLM with shrunken dispersions and Wald contrasts
#[derive(Debug, Clone, Default)]
pub struct NbGlmEngine {
    pub glm: GlmFitParams,
    pub dispersion: DispersionParams,
    pub wald: WaldParams,
}

impl ContrastEngine for NbGlmEngine {
    fn fit(&self, counts: &CountMatrix, design: &Design, contrast: &Array1<f64>) -> Result<Vec<FeatureRecord>> {
        let raw = counts.counts();
        let size_factors = estimate_size_factors_auto(raw)?;
        let normalized = normalized_counts(raw, size_factors.view())?;
        let means = base_means(normalized.view());

        let dispersions = estimate_dispersions(
            raw,
            normalized.view(),
            size_factors.view(),
            means.view(),
            &design.matrix,
            &self.dispersion,
            &self.glm,
        )?;
        // all-zero features have no estimate; any positive value gives them a finite fit
        let alphas = dispersions
            .final_estimates
            .iter()
            .zip(dispersions.trended.iter())
            .map(|(&a, &t)| if a.is_finite() { a } else { t })
            .collect::<Array1<f64>>();

        let fits = fit_features(raw, &design.matrix, size_factors.view(), alphas.view(), &self.glm);

        let testable: Vec<bool> = means.iter().map(|&m| m > 0.0).collect();
        let n_testable = testable.iter().filter(|&&t| t).count();
        let n_converged = fits
            .iter()
            .zip(&testable)
            .filter(|(f, &t)| t && f.converged)
            .count();
        if n_testable > 0 && n_converged == 0 {
            return Err(BatchError::FitConvergence {
                reason: format!("none of {} testable features converged", n_testable),
            });
        }
        if n_converged < n_testable {
            log::debug!("{} of {} features did not converge", n_testable - n_converged, n_testable);
        }

        let stats: Vec<WaldStatistic> = fits
            .iter()
            .zip(&testable)
            .map(|(fit, &t)| if t { wald_test(fit, contrast) } else { WaldStatistic::untestable() })
            .collect();

        let pvalues: Vec<f64> = stats.iter().map(|s| s.p_value).collect();
        let padj = if self.wald.independent_filtering {
            independent_filtering(&pvalues, &means.to_vec(), self.wald.filter_alpha).padj
        } else {
            benjamini_hochberg(&pvalues)
        };

        Ok(counts
            .feature_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| FeatureRecord {
                feature_id: id.clone(),
                effect_size: stats[i].log2_fold_change,
                mean_abundance: means[i],
                p_value: stats[i].p_value,
                adjusted_p_value: padj[i],
                name: None,
            })
            .collect())
    }
}

/// Unsorted, unannotated records plus the formula actually fitted
#[derive(Debug, Clone)]
pub struct FittedContrast {
    pub formula: ModelFormula,
    pub rows: Vec<FeatureRecord>,
}

/// Check both levels against the subset, then build the design and the
/// `level_a - level_b` contrast vector for `formula`.
///
/// The returned design may have dropped the blocking term when it is not
/// estimable on this subset.
pub fn prepare_contrast(
    subset: &SubsetDataset,
    formula: &ModelFormula,
    level_a: &str,
    level_b: &str,
) -> Result<(Design, Array1<f64>)> {
    let factor = formula.variable.as_str();
    if level_a == level_b {
        return Err(BatchError::InvalidContrast {
            reason: format!("both levels of '{}' are '{}'", factor, level_a),
        });
    }
    let levels = subset
        .metadata()
        .levels(factor)
        .ok_or_else(|| BatchError::UnknownFactor {
            factor: factor.to_string(),
        })?;
    for level in [level_a, level_b] {
        if !levels.iter().any(|l| l == level) {
            return Err(BatchError::InvalidContrast {
                reason: format!(
                    "level '{}' of '{}' is not present in the subset (levels: {})",
                    level,
                    factor,
                    levels.join(", ")
                ),
            });
        }
    }

    let design = build_design(subset.metadata(), formula)?;
    let contrast = design.contrast_vector(factor, level_a, level_b)?;
    Ok((design, contrast))
}

/// Builds the design and contrast for a subset and delegates to an engine
pub struct ContrastFitter {
    engine: Box<dyn ContrastEngine>,
}

impl Default for ContrastFitter {
    fn default() -> Self {
        Self::new(NbGlmEngine::default())
    }
}

impl ContrastFitter {
    pub fn new<E: ContrastEngine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    /// Fit `formula` on the subset and test `level_a` against `level_b` of its variable.
    ///
    /// Effect sizes are log2(level_a / level_b), so swapping the levels negates
    /// them and leaves p-values unchanged.
    pub fn fit(
        &self,
        subset: &SubsetDataset,
        formula: &ModelFormula,
        level_a: &str,
        level_b: &str,
    ) -> Result<FittedContrast> {
        let (design, contrast) = prepare_contrast(subset, formula, level_a, level_b)?;
        log::debug!(
            "Fitting {} on {} samples x {} features, coefficients {:?}",
            design.formula,
            subset.n_samples(),
            subset.n_features(),
            design.coef_names
        );

        let rows = self.engine.fit(subset.counts(), &design, &contrast)?;
        Ok(FittedContrast {
            formula: design.formula,
            rows,
        })
    }
}
