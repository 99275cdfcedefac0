//! Statistical testing of contrasts

mod fdr;
mod pvalue;
mod wald;

pub use fdr::benjamini_hochberg;
pub use pvalue::calculate_pvalue;
pub use wald::{wald_test, WaldStatistic};

/// Parameters for the test and p-value adjustment
#[derive(Debug, Clone)]
pub struct WaldParams {
    /// Target FDR used to choose the independent filtering threshold
    pub filter_alpha: f64,
    /// Filter low mean features before BH adjustment
    pub independent_filtering: bool,
}

impl Default for WaldParams {
    fn default() -> Self {
        Self {
            filter_alpha: 0.1,
            independent_filtering: true,
        }
    }
}
