//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided p-value of a standard normal statistic; NaN for non-finite input
pub fn calculate_pvalue(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.cdf(-z.abs()),
        Err(_) => f64::NAN,
    }
}
