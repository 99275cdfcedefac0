//! Sample metadata: one categorical value per sample for each factor column

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BatchError, Result};

/// Sample metadata containing experimental factors
///
/// Factor columns keep the order in which they were added (file column order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    sample_ids: Vec<String>,
    factor_names: Vec<String>,
    factors: HashMap<String, Vec<String>>,
}

impl SampleMetadata {
    pub fn new(sample_ids: Vec<String>) -> Self {
        Self {
            sample_ids,
            factor_names: Vec::new(),
            factors: HashMap::new(),
        }
    }

    /// Add (or replace) a factor column
    pub fn add_factor(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(BatchError::DimensionMismatch {
                expected: format!("{} values for factor '{}'", self.sample_ids.len(), name),
                got: format!("{} values", values.len()),
            });
        }
        if self.factors.insert(name.to_string(), values).is_none() {
            self.factor_names.push(name.to_string());
        }
        Ok(())
    }

    pub fn has_factor(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }

    /// Values of one factor column, in sample order
    pub fn factor(&self, name: &str) -> Option<&[String]> {
        self.factors.get(name).map(|v| v.as_slice())
    }

    /// Factor names in column order
    pub fn factor_names(&self) -> &[String] {
        &self.factor_names
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Value of a factor for one sample
    pub fn value(&self, factor: &str, sample_idx: usize) -> Option<&str> {
        self.factors
            .get(factor)
            .and_then(|v| v.get(sample_idx))
            .map(|s| s.as_str())
    }

    /// Distinct levels of a factor, sorted alphabetically
    pub fn levels(&self, factor: &str) -> Option<Vec<String>> {
        self.factors.get(factor).map(|values| {
            let mut unique = values.clone();
            unique.sort();
            unique.dedup();
            unique
        })
    }

    /// Indices of samples whose factor value equals `level`
    pub fn samples_with_level(&self, factor: &str, level: &str) -> Vec<usize> {
        self.factors
            .get(factor)
            .map(|values| {
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.as_str() == level)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Restrict (or reorder) to the given sample indices
    pub fn subset(&self, sample_indices: &[usize]) -> Result<Self> {
        let ids = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();
        let mut subset = SampleMetadata::new(ids);
        for name in &self.factor_names {
            let values = &self.factors[name];
            subset.add_factor(name, sample_indices.iter().map(|&i| values[i].clone()).collect())?;
        }
        Ok(subset)
    }
}
