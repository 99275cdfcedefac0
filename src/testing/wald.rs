//! Wald test of a linear contrast of GLM coefficients

use ndarray::Array1;

use super::pvalue::calculate_pvalue;
use crate::glm::FeatureFit;

/// Wald result for one feature; effect and standard error on the log2 scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaldStatistic {
    pub log2_fold_change: f64,
    pub lfc_se: f64,
    pub stat: f64,
    pub p_value: f64,
}

impl WaldStatistic {
    /// Zero effect and missing p-value, used for features with no counts
    pub fn untestable() -> Self {
        Self {
            log2_fold_change: 0.0,
            lfc_se: 0.0,
            stat: f64::NAN,
            p_value: f64::NAN,
        }
    }
}

/// Test c'beta = 0 for one fitted feature
///
/// stat = c'beta / sqrt(c' Sigma c), two-sided normal p-value.
pub fn wald_test(fit: &FeatureFit, contrast: &Array1<f64>) -> WaldStatistic {
    let ln2 = std::f64::consts::LN_2;
    let estimate = contrast.dot(&fit.beta);
    let variance = contrast.dot(&fit.covariance.dot(contrast));
    let se = if variance > 0.0 { variance.sqrt() } else { f64::NAN };
    let stat = if se.is_finite() { estimate / se } else { f64::NAN };

    WaldStatistic {
        log2_fold_change: estimate / ln2,
        lfc_se: se / ln2,
        stat,
        p_value: calculate_pvalue(stat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fit() -> FeatureFit {
        FeatureFit {
            beta: array![4.0, 2.0 * std::f64::consts::LN_2],
            covariance: array![[0.04, -0.02], [-0.02, 0.09]],
            mu: array![1.0],
            converged: true,
            deviance: 0.0,
        }
    }

    #[test]
    fn test_contrast_sign_flip() {
        let forward = wald_test(&fit(), &array![0.0, 1.0]);
        let reverse = wald_test(&fit(), &array![0.0, -1.0]);

        assert!((forward.log2_fold_change - 2.0).abs() < 1e-12);
        assert_eq!(reverse.log2_fold_change, -forward.log2_fold_change);
        assert_eq!(reverse.stat, -forward.stat);
        assert_eq!(reverse.p_value, forward.p_value);
        assert!((forward.stat - 2.0 * std::f64::consts::LN_2 / 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_is_untestable() {
        let w = wald_test(&fit(), &array![0.0, 0.0]);
        assert!(w.p_value.is_nan());
    }
}
