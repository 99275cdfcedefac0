//! Hold-constant sample selection

use crate::data::{BaseDataset, SubsetDataset};
use crate::error::{BatchError, Result};

/// Restricts a base dataset to the samples matching one metadata condition
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetSubsetter;

impl DatasetSubsetter {
    /// Samples where `factor == value`, in base order.
    ///
    /// `value` is trimmed before an exact comparison. The base is not modified.
    pub fn subset(&self, base: &BaseDataset, factor: &str, value: &str) -> Result<SubsetDataset> {
        let metadata = base.metadata();
        if !metadata.has_factor(factor) {
            return Err(BatchError::UnknownFactor {
                factor: factor.to_string(),
            });
        }

        let value = value.trim();
        let indices = metadata.samples_with_level(factor, value);
        if indices.is_empty() {
            return Err(BatchError::EmptySubset {
                factor: factor.to_string(),
                value: value.to_string(),
            });
        }

        log::debug!(
            "Subset {} == '{}': {} of {} samples",
            factor,
            value,
            indices.len(),
            base.n_samples()
        );
        base.select_samples(&indices, factor, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn base() -> BaseDataset {
        let samples = strings(&["s1", "s2", "s3", "s4"]);
        let counts = CountMatrix::new(
            array![[1.0, 2.0, 3.0, 4.0], [10.0, 20.0, 30.0, 40.0]],
            strings(&["f1", "f2"]),
            samples.clone(),
        )
        .unwrap();
        let mut metadata = SampleMetadata::new(samples);
        metadata
            .add_factor("tlr", strings(&["on", "off", "on", "off"]))
            .unwrap();
        BaseDataset::new(counts, metadata).unwrap()
    }

    #[test]
    fn test_subset_keeps_exactly_matching_samples() {
        let base = base();
        let subset = DatasetSubsetter.subset(&base, "tlr", " on ").unwrap();

        assert_eq!(subset.sample_ids(), &["s1", "s3"]);
        assert_eq!(subset.counts().counts(), array![[1.0, 3.0], [10.0, 30.0]]);
        assert_eq!(subset.metadata().factor("tlr").unwrap(), &["on", "on"]);
        assert_eq!(subset.hold_constant(), ("tlr", "on"));
        assert_eq!(base.n_samples(), 4);
    }

    #[test]
    fn test_unknown_factor() {
        let err = DatasetSubsetter.subset(&base(), "batch", "x").unwrap_err();
        assert!(matches!(err, BatchError::UnknownFactor { factor } if factor == "batch"));
    }

    #[test]
    fn test_empty_subset() {
        let err = DatasetSubsetter.subset(&base(), "tlr", "ON").unwrap_err();
        assert!(matches!(err, BatchError::EmptySubset { .. }));
    }
}
