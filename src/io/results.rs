//! Per-comparison result structures

use serde::{Deserialize, Serialize};

/// One feature's row in a comparison result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub feature_id: String,
    /// log2 fold change of level A over level B
    pub effect_size: f64,
    /// Mean of normalized counts across the subset
    pub mean_abundance: f64,
    /// Raw p-value; NaN when the feature was not testable
    pub p_value: f64,
    /// Benjamini-Hochberg adjusted p-value; NaN when not testable or filtered
    pub adjusted_p_value: f64,
    /// Human-readable name, when the lookup knows the feature
    pub name: Option<String>,
}

impl FeatureRecord {
    /// Record for a feature that could not be tested
    pub fn untested(feature_id: &str, mean_abundance: f64) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            effect_size: 0.0,
            mean_abundance,
            p_value: f64::NAN,
            adjusted_p_value: f64::NAN,
            name: None,
        }
    }

    /// Significant at `alpha` with an absolute effect of at least `min_effect`
    pub fn is_significant(&self, alpha: f64, min_effect: f64) -> bool {
        self.adjusted_p_value.is_finite()
            && self.adjusted_p_value < alpha
            && self.effect_size.abs() >= min_effect
    }
}

/// Ordered two-level contrast on one factor; effect sizes are `level_a` vs `level_b`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contrast {
    pub factor: String,
    pub level_a: String,
    pub level_b: String,
}

impl Contrast {
    pub fn new(factor: &str, level_a: &str, level_b: &str) -> Self {
        Self {
            factor: factor.to_string(),
            level_a: level_a.to_string(),
            level_b: level_b.to_string(),
        }
    }
}

impl std::fmt::Display for Contrast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} vs {}", self.factor, self.level_a, self.level_b)
    }
}

/// Annotated, ranked result of one comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContrastResult {
    pub comparison_id: String,
    /// Model formula as actually fitted, e.g. `~ donor + dendrimer`
    pub formula: String,
    pub contrast: Contrast,
    /// Sorted ascending by p-value, untestable features last
    pub rows: Vec<FeatureRecord>,
}

impl ContrastResult {
    pub fn n_features(&self) -> usize {
        self.rows.len()
    }

    /// The first `n` rows (the most significant ones)
    pub fn top(&self, n: usize) -> &[FeatureRecord] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Feature ids significant at `alpha` with |effect| >= `min_effect`
    pub fn significant_features(&self, alpha: f64, min_effect: f64) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.is_significant(alpha, min_effect))
            .map(|r| r.feature_id.as_str())
            .collect()
    }

    pub fn summary(&self, alpha: f64) -> ResultsSummary {
        let significant: Vec<&FeatureRecord> = self
            .rows
            .iter()
            .filter(|r| r.is_significant(alpha, 0.0))
            .collect();
        ResultsSummary {
            total_features: self.rows.len(),
            features_tested: self.rows.iter().filter(|r| r.p_value.is_finite()).count(),
            significant: significant.len(),
            increased: significant.iter().filter(|r| r.effect_size > 0.0).count(),
            decreased: significant.iter().filter(|r| r.effect_size < 0.0).count(),
            alpha,
        }
    }
}

/// Counts of tested and significant features in one result
#[derive(Debug, Clone, Serialize)]
pub struct ResultsSummary {
    pub total_features: usize,
    pub features_tested: usize,
    pub significant: usize,
    pub increased: usize,
    pub decreased: usize,
    pub alpha: f64,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} features, {} tested, {} with adjusted p < {} ({} up, {} down)",
            self.total_features,
            self.features_tested,
            self.significant,
            self.alpha,
            self.increased,
            self.decreased
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, effect: f64, padj: f64) -> FeatureRecord {
        FeatureRecord {
            feature_id: id.to_string(),
            effect_size: effect,
            mean_abundance: 100.0,
            p_value: padj / 2.0,
            adjusted_p_value: padj,
            name: None,
        }
    }

    #[test]
    fn test_summary_and_significance() {
        let result = ContrastResult {
            comparison_id: "c".to_string(),
            formula: "~ donor + dendrimer".to_string(),
            contrast: Contrast::new("dendrimer", "galnac", "control"),
            rows: vec![
                record("a", 2.0, 0.001),
                record("b", -0.5, 0.01),
                record("c", -3.0, 0.2),
                FeatureRecord::untested("d", 0.0),
            ],
        };

        let summary = result.summary(0.05);
        assert_eq!(summary.total_features, 4);
        assert_eq!(summary.features_tested, 3);
        assert_eq!(summary.significant, 2);
        assert_eq!((summary.increased, summary.decreased), (1, 1));

        assert_eq!(result.significant_features(0.05, 1.0), vec!["a"]);
        assert_eq!(result.top(2).len(), 2);
        assert_eq!(result.top(10).len(), 4);
    }
}
