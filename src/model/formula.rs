//! Closed set of varying factors and the donor-blocked formulas they map to

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, Result};

/// Varying factors a comparison may contrast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaryingFactor {
    Dendrimer,
    Tlr,
}

impl VaryingFactor {
    pub const ALL: [VaryingFactor; 2] = [VaryingFactor::Dendrimer, VaryingFactor::Tlr];

    pub fn as_str(&self) -> &'static str {
        match self {
            VaryingFactor::Dendrimer => "dendrimer",
            VaryingFactor::Tlr => "tlr",
        }
    }

    /// Case-insensitive match on the factor name
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
    }

    fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Right-hand side of a model: blocking covariates followed by the contrasted variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFormula {
    pub factor: VaryingFactor,
    /// Metadata column holding the contrasted variable
    pub variable: String,
    /// Covariates adjusted for, in formula order
    pub blocking: Vec<String>,
}

impl ModelFormula {
    /// Variable only, no covariates
    pub fn without_blocking(&self) -> Self {
        Self {
            factor: self.factor,
            variable: self.variable.clone(),
            blocking: Vec::new(),
        }
    }

    /// All terms in formula order
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.blocking
            .iter()
            .map(|s| s.as_str())
            .chain(std::iter::once(self.variable.as_str()))
    }
}

impl std::fmt::Display for ModelFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let terms: Vec<&str> = self.terms().collect();
        write!(f, "~ {}", terms.join(" + "))
    }
}

/// Maps a varying factor name to its model formula
#[derive(Debug, Clone)]
pub struct ModelSelector {
    /// Covariate that controls for paired samples
    pub blocking_factor: String,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            blocking_factor: "donor".to_string(),
        }
    }
}

impl ModelSelector {
    pub fn new(blocking_factor: &str) -> Self {
        Self {
            blocking_factor: blocking_factor.to_string(),
        }
    }

    /// Formula `~ <blocking> + <factor>` for a supported factor, UnsupportedFactor otherwise
    pub fn select_formula(&self, varying_factor: &str) -> Result<ModelFormula> {
        let factor = VaryingFactor::parse(varying_factor).ok_or_else(|| {
            BatchError::UnsupportedFactor {
                factor: varying_factor.to_string(),
                supported: VaryingFactor::supported_names(),
            }
        })?;
        let blocking = if self.blocking_factor.is_empty() {
            Vec::new()
        } else {
            vec![self.blocking_factor.clone()]
        };
        Ok(ModelFormula {
            factor,
            variable: varying_factor.trim().to_string(),
            blocking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_factors() {
        let selector = ModelSelector::default();
        let f = selector.select_formula("dendrimer").unwrap();
        assert_eq!(f.factor, VaryingFactor::Dendrimer);
        assert_eq!(f.to_string(), "~ donor + dendrimer");

        let f = selector.select_formula("tlr").unwrap();
        assert_eq!(f.to_string(), "~ donor + tlr");
        assert_eq!(f.without_blocking().to_string(), "~ tlr");
    }

    #[test]
    fn test_case_insensitive_keeps_column_name() {
        let f = ModelSelector::default().select_formula("TLR").unwrap();
        assert_eq!(f.factor, VaryingFactor::Tlr);
        assert_eq!(f.variable, "TLR");
    }

    #[test]
    fn test_unsupported_factor() {
        match ModelSelector::default().select_formula("timepoint") {
            Err(BatchError::UnsupportedFactor { factor, supported }) => {
                assert_eq!(factor, "timepoint");
                assert_eq!(supported, "dendrimer, tlr");
            }
            other => panic!("expected UnsupportedFactor, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_blocking() {
        let f = ModelSelector::new("batch").select_formula("dendrimer").unwrap();
        assert_eq!(f.to_string(), "~ batch + dendrimer");
        let f = ModelSelector::new("").select_formula("dendrimer").unwrap();
        assert_eq!(f.to_string(), "~ dendrimer");
    }
}
