//! One planned comparison

use serde::{Deserialize, Serialize};

use crate::io::Contrast;

/// A validated row of the comparison table.
///
/// Samples with `hold_constant_factor == hold_constant_value` are compared
/// between `level_a` and `level_b` of `varying_factor`; effect sizes are
/// reported as `level_a` over `level_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSpec {
    pub id: String,
    pub hold_constant_factor: String,
    pub hold_constant_value: String,
    pub varying_factor: String,
    pub level_a: String,
    pub level_b: String,
    /// 1-based line in the source table, for diagnostics
    pub row: usize,
}

impl ComparisonSpec {
    pub fn contrast(&self) -> Contrast {
        Contrast::new(&self.varying_factor, &self.level_a, &self.level_b)
    }
}

impl std::fmt::Display for ComparisonSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} = {}] {}: {} vs {}",
            self.id,
            self.hold_constant_factor,
            self.hold_constant_value,
            self.varying_factor,
            self.level_a,
            self.level_b
        )
    }
}
