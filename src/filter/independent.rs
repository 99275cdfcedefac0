//! Independent filtering on mean abundance before BH adjustment

use crate::stats::quantile_sorted;
use crate::testing::benjamini_hochberg;

/// Chosen filter and the resulting adjusted p-values
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Adjusted p-values; NaN for untested or filtered features
    pub padj: Vec<f64>,
    /// Quantile of mean abundance below which features were filtered
    pub theta: f64,
    /// Mean abundance cutoff matching `theta`
    pub cutoff: f64,
    pub rejections: usize,
}

/// Pick the mean-abundance quantile that maximizes rejections at `alpha`.
///
/// Fifty quantiles between the share of zero-mean features and 0.95 are tried.
/// When no quantile yields more than ten rejections nothing is filtered.
pub fn independent_filtering(pvalues: &[f64], base_means: &[f64], alpha: f64) -> FilterOutcome {
    let unfiltered = || {
        let padj = benjamini_hochberg(pvalues);
        let rejections = count_rejections(&padj, alpha);
        FilterOutcome {
            padj,
            theta: 0.0,
            cutoff: 0.0,
            rejections,
        }
    };

    let mut sorted: Vec<f64> = base_means.iter().copied().filter(|m| m.is_finite()).collect();
    if sorted.is_empty() {
        return unfiltered();
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let zero_share = base_means.iter().filter(|&&m| m == 0.0 || !m.is_finite()).count() as f64
        / base_means.len() as f64;
    let upper = if zero_share < 0.95 { 0.95 } else { 1.0 };
    let n_theta = 50;

    let candidates: Vec<FilterOutcome> = (0..n_theta)
        .map(|i| {
            let theta = zero_share + (upper - zero_share) * i as f64 / (n_theta - 1) as f64;
            let cutoff = quantile_sorted(&sorted, theta);
            let kept: Vec<f64> = pvalues
                .iter()
                .zip(base_means)
                .map(|(&p, &m)| if m >= cutoff { p } else { f64::NAN })
                .collect();
            let padj = benjamini_hochberg(&kept);
            let rejections = count_rejections(&padj, alpha);
            FilterOutcome {
                padj,
                theta,
                cutoff,
                rejections,
            }
        })
        .collect();

    let max_rej = candidates.iter().map(|c| c.rejections).max().unwrap_or(0);
    if max_rej <= 10 {
        log::debug!("Independent filtering skipped: at most {} rejections", max_rej);
        return unfiltered();
    }

    let best = candidates
        .into_iter()
        .find(|c| c.rejections == max_rej)
        .unwrap_or_else(unfiltered);
    log::debug!(
        "Independent filtering: theta={:.3}, cutoff={:.2}, rejections={}",
        best.theta,
        best.cutoff,
        best.rejections
    );
    best
}

fn count_rejections(padj: &[f64], alpha: f64) -> usize {
    padj.iter().filter(|&&p| p.is_finite() && p < alpha).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_few_rejections_means_no_filtering() {
        let pvalues = vec![0.001, 0.5, 0.2, 0.9];
        let means = vec![1.0, 100.0, 50.0, 10.0];
        let outcome = independent_filtering(&pvalues, &means, 0.1);
        assert_eq!(outcome.padj, benjamini_hochberg(&pvalues));
        assert_eq!(outcome.theta, 0.0);
    }

    #[test]
    fn test_filtering_removes_low_mean_noise() {
        // 20 strong signals at high mean, 80 uninformative features at low mean
        let mut pvalues = vec![1e-4; 20];
        let mut means = vec![1000.0; 20];
        for i in 0..80 {
            pvalues.push(0.2 + 0.01 * i as f64);
            means.push(1.0 + i as f64 * 0.01);
        }
        let outcome = independent_filtering(&pvalues, &means, 0.1);
        assert!(outcome.rejections >= 20);
        assert!(outcome.padj[0] <= benjamini_hochberg(&pvalues)[0]);
        assert!(outcome.padj.iter().skip(20).any(|p| p.is_nan()) || outcome.theta == 0.0);
    }
}
