//! Comparison definitions and the table loader that produces them

mod loader;
mod spec;

pub use loader::{load_comparison_specs, load_comparison_specs_file, SpecColumns};
pub use spec::ComparisonSpec;
