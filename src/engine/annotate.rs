//! Feature naming and significance ordering

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::io::{read_feature_names, Contrast, ContrastResult, FeatureRecord};

/// Maps feature ids to human-readable names
pub trait FeatureLookup: Send + Sync {
    fn name(&self, feature_id: &str) -> Option<String>;
}

/// Lookup backed by an in-memory id -> name table
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<String, String>,
}

impl NameTable {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// Load from a delimited file with the given id and name columns
    pub fn from_file<P: AsRef<Path>>(path: P, id_column: &str, name_column: &str) -> Result<Self> {
        Ok(Self::new(read_feature_names(path, id_column, name_column)?))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FeatureLookup for NameTable {
    fn name(&self, feature_id: &str) -> Option<String> {
        self.names
            .get(feature_id)
            .filter(|n| !n.trim().is_empty())
            .cloned()
    }
}

/// Lookup that knows no names
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNames;

impl FeatureLookup for NoNames {
    fn name(&self, _feature_id: &str) -> Option<String> {
        None
    }
}

/// NaN p-values sort after every finite one
fn by_pvalue(a: &FeatureRecord, b: &FeatureRecord) -> Ordering {
    match (a.p_value.is_nan(), b.p_value.is_nan()) {
        (false, false) => a.p_value.total_cmp(&b.p_value),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

/// Attach names and sort rows ascending by p-value (stable, missing last)
pub fn annotate(
    comparison_id: &str,
    formula: &str,
    contrast: Contrast,
    mut rows: Vec<FeatureRecord>,
    lookup: &dyn FeatureLookup,
) -> ContrastResult {
    for row in rows.iter_mut() {
        row.name = lookup.name(&row.feature_id);
    }
    rows.sort_by(by_pvalue);

    ContrastResult {
        comparison_id: comparison_id.to_string(),
        formula: formula.to_string(),
        contrast,
        rows,
    }
}
