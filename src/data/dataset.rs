//! Shared base dataset and the per-comparison subsets carved out of it

use std::collections::{HashMap, HashSet};

use super::{CountMatrix, SampleMetadata};
use crate::error::{BatchError, Result};

/// Upstream low-count feature filter applied before the base dataset is frozen
#[derive(Debug, Clone)]
pub struct LowCountFilter {
    /// Minimum count a sample must reach to count towards `min_samples`
    pub min_count: f64,
    /// Minimum number of samples at or above `min_count`
    pub min_samples: usize,
}

impl Default for LowCountFilter {
    fn default() -> Self {
        Self {
            min_count: 10.0,
            min_samples: 3,
        }
    }
}

fn find_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    ids.iter().map(String::as_str).find(|id| !seen.insert(*id))
}

/// Count matrix plus sample metadata, shared read-only by every comparison in a batch
///
/// Count columns and metadata rows always hold the same sample ids in the same order.
#[derive(Debug, Clone)]
pub struct BaseDataset {
    counts: CountMatrix,
    metadata: SampleMetadata,
}

impl BaseDataset {
    /// Build the dataset, requiring count columns to equal metadata samples in order
    pub fn new(counts: CountMatrix, metadata: SampleMetadata) -> Result<Self> {
        if let Some(dup) = find_duplicate(counts.sample_ids()) {
            return Err(BatchError::SampleMismatch {
                reason: format!("sample '{}' appears twice in the count matrix", dup),
            });
        }
        if let Some(dup) = find_duplicate(metadata.sample_ids()) {
            return Err(BatchError::SampleMismatch {
                reason: format!("sample '{}' appears twice in the metadata", dup),
            });
        }
        if counts.sample_ids() != metadata.sample_ids() {
            let position = counts
                .sample_ids()
                .iter()
                .zip(metadata.sample_ids())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| counts.n_samples().min(metadata.n_samples()));
            return Err(BatchError::SampleMismatch {
                reason: format!(
                    "count columns ({} samples) and metadata rows ({} samples) differ at position {}",
                    counts.n_samples(),
                    metadata.n_samples(),
                    position + 1
                ),
            });
        }
        Ok(Self { counts, metadata })
    }

    /// Build the dataset after reordering metadata rows to the count column order
    ///
    /// Both inputs must contain the same set of sample ids.
    pub fn aligned(counts: CountMatrix, metadata: SampleMetadata) -> Result<Self> {
        if let Some(dup) = find_duplicate(metadata.sample_ids()) {
            return Err(BatchError::SampleMismatch {
                reason: format!("sample '{}' appears twice in the metadata", dup),
            });
        }
        let meta_index: HashMap<&str, usize> = metadata
            .sample_ids()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let count_set: HashSet<&str> = counts.sample_ids().iter().map(|s| s.as_str()).collect();

        let only_counts: Vec<&str> = counts
            .sample_ids()
            .iter()
            .map(|s| s.as_str())
            .filter(|id| !meta_index.contains_key(id))
            .collect();
        let only_meta: Vec<&str> = metadata
            .sample_ids()
            .iter()
            .map(|s| s.as_str())
            .filter(|id| !count_set.contains(id))
            .collect();

        if !only_counts.is_empty() || !only_meta.is_empty() {
            return Err(BatchError::SampleMismatch {
                reason: format!(
                    "in counts but not metadata: {:?}; in metadata but not counts: {:?}",
                    only_counts, only_meta
                ),
            });
        }

        let order: Vec<usize> = counts
            .sample_ids()
            .iter()
            .map(|id| meta_index[id.as_str()])
            .collect();
        if order.iter().enumerate().any(|(i, &j)| i != j) {
            log::info!("Reordering metadata rows to match count matrix columns");
        }
        let metadata = metadata.subset(&order)?;
        Self::new(counts, metadata)
    }

    /// Drop low-count features; an empty result is an error
    pub fn filter_low_counts(&self, filter: &LowCountFilter) -> Result<Self> {
        let counts = self
            .counts
            .filter_low_counts(filter.min_count, filter.min_samples)?;
        log::info!(
            "Low-count filter (count >= {} in >= {} samples) kept {} of {} features",
            filter.min_count,
            filter.min_samples,
            counts.n_features(),
            self.counts.n_features()
        );
        Ok(Self {
            counts,
            metadata: self.metadata.clone(),
        })
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn feature_ids(&self) -> &[String] {
        self.counts.feature_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    pub fn n_features(&self) -> usize {
        self.counts.n_features()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    /// Copy out the samples at `indices` (in that order) as a subset dataset
    pub fn select_samples(&self, indices: &[usize], factor: &str, value: &str) -> Result<SubsetDataset> {
        Ok(SubsetDataset {
            counts: self.counts.subset_samples(indices)?,
            metadata: self.metadata.subset(indices)?,
            hold_constant: (factor.to_string(), value.to_string()),
        })
    }
}

/// Samples of a base dataset matching one hold-constant condition
///
/// Owned by a single comparison and never mutated after creation.
#[derive(Debug, Clone)]
pub struct SubsetDataset {
    counts: CountMatrix,
    metadata: SampleMetadata,
    hold_constant: (String, String),
}

impl SubsetDataset {
    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    pub fn feature_ids(&self) -> &[String] {
        self.counts.feature_ids()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.counts.n_features()
    }

    /// The (factor, value) pair that selected these samples
    pub fn hold_constant(&self) -> (&str, &str) {
        (&self.hold_constant.0, &self.hold_constant.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn counts(samples: &[&str]) -> CountMatrix {
        CountMatrix::new(
            array![[10.0, 20.0, 30.0], [40.0, 50.0, 60.0]],
            strings(&["f1", "f2"]),
            strings(samples),
        )
        .unwrap()
    }

    fn metadata(samples: &[&str], groups: &[&str]) -> SampleMetadata {
        let mut meta = SampleMetadata::new(strings(samples));
        meta.add_factor("group", strings(groups)).unwrap();
        meta
    }

    #[test]
    fn test_new_requires_same_order() {
        let ok = BaseDataset::new(counts(&["a", "b", "c"]), metadata(&["a", "b", "c"], &["x", "y", "x"]));
        assert!(ok.is_ok());

        let swapped = BaseDataset::new(counts(&["a", "b", "c"]), metadata(&["b", "a", "c"], &["x", "y", "x"]));
        assert!(matches!(swapped, Err(BatchError::SampleMismatch { .. })));
    }

    #[test]
    fn test_new_rejects_duplicate_samples() {
        let dup = BaseDataset::new(counts(&["a", "a", "c"]), metadata(&["a", "a", "c"], &["x", "y", "x"]));
        assert!(matches!(dup, Err(BatchError::SampleMismatch { .. })));
    }

    #[test]
    fn test_aligned_reorders_metadata() {
        let ds = BaseDataset::aligned(counts(&["a", "b", "c"]), metadata(&["c", "a", "b"], &["z", "x", "y"]))
            .unwrap();
        assert_eq!(ds.metadata().sample_ids(), &["a", "b", "c"]);
        assert_eq!(ds.metadata().factor("group").unwrap(), &["x", "y", "z"]);
    }

    #[test]
    fn test_aligned_reports_missing_samples() {
        let err = BaseDataset::aligned(counts(&["a", "b", "c"]), metadata(&["a", "b", "d"], &["x", "y", "z"]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"c\""));
        assert!(msg.contains("\"d\""));
    }

    #[test]
    fn test_aligned_rejects_duplicate_metadata_rows() {
        let counts = CountMatrix::new(
            array![[10.0, 20.0], [40.0, 50.0]],
            strings(&["f1", "f2"]),
            strings(&["a", "b"]),
        )
        .unwrap();
        let err = BaseDataset::aligned(counts, metadata(&["a", "b", "a"], &["x", "y", "z"])).unwrap_err();
        assert!(matches!(err, BatchError::SampleMismatch { .. }));
        assert!(err.to_string().contains("'a' appears twice"));
    }

    #[test]
    fn test_select_samples() {
        let ds = BaseDataset::new(counts(&["a", "b", "c"]), metadata(&["a", "b", "c"], &["x", "y", "x"]))
            .unwrap();
        let sub = ds.select_samples(&[0, 2], "group", "x").unwrap();
        assert_eq!(sub.sample_ids(), &["a", "c"]);
        assert_eq!(sub.counts().counts(), array![[10.0, 30.0], [40.0, 60.0]]);
        assert_eq!(sub.hold_constant(), ("group", "x"));
        // base untouched
        assert_eq!(ds.n_samples(), 3);
    }
}
