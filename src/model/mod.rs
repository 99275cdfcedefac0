//! Model selection: formulas per varying factor and their design matrices

mod design;
mod formula;

pub use design::{build_design, matrix_rank, Design};
pub use formula::{ModelFormula, ModelSelector, VaryingFactor};
