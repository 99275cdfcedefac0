//! Filtering applied before multiple testing correction

mod independent;

pub use independent::{independent_filtering, FilterOutcome};
