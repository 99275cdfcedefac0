//! Count matrix representation (features x samples)

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{BatchError, Result};

/// Rename repeated feature ids to `<id>_1`, `<id>_2`, ... so every row keeps a unique key
fn deduplicate_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    if ids.iter().all(|id| seen.insert(id.clone(), 0).is_none()) {
        return ids;
    }
    seen.clear();
    ids.into_iter()
        .map(|id| {
            let count = seen.entry(id.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                id
            } else {
                let renamed = format!("{}_{}", id, *count - 1);
                log::warn!("Duplicate feature id '{}' renamed to '{}'", id, renamed);
                renamed
            }
        })
        .collect()
}

/// Raw abundance counts. Rows are features, columns are samples.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    counts: Array2<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix, rejecting negative or non-finite values
    pub fn new(
        counts: Array2<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_features, n_samples) = counts.dim();

        if feature_ids.len() != n_features {
            return Err(BatchError::DimensionMismatch {
                expected: format!("{} feature IDs", n_features),
                got: format!("{} feature IDs", feature_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(BatchError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if counts.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(BatchError::InvalidCountMatrix {
                reason: "Counts must be non-negative finite values".to_string(),
            });
        }

        if counts.iter().any(|&x| x != x.round()) {
            log::warn!(
                "Some count values are not integers; the negative binomial model expects integer counts"
            );
        }

        Ok(Self {
            counts,
            feature_ids: deduplicate_ids(feature_ids),
            sample_ids,
        })
    }

    pub fn n_features(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Raw counts as a view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Sum of counts per sample (library size)
    pub fn library_sizes(&self) -> Vec<f64> {
        self.counts
            .axis_iter(Axis(1))
            .map(|col| col.sum())
            .collect()
    }

    /// Keep features with at least `min_samples` samples at or above `min_count`
    pub fn filter_low_counts(&self, min_count: f64, min_samples: usize) -> Result<Self> {
        let keep: Vec<usize> = (0..self.n_features())
            .filter(|&i| {
                self.counts
                    .row(i)
                    .iter()
                    .filter(|&&x| x >= min_count)
                    .count()
                    >= min_samples
            })
            .collect();

        if keep.is_empty() {
            return Err(BatchError::EmptyData {
                reason: format!(
                    "no feature has {} or more samples with count >= {}",
                    min_samples, min_count
                ),
            });
        }

        let ids = keep.iter().map(|&i| self.feature_ids[i].clone()).collect();
        Self::new(self.counts.select(Axis(0), &keep), ids, self.sample_ids.clone())
    }

    /// Restrict (or reorder) the columns to the given sample indices
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let ids = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();
        Self::new(
            self.counts.select(Axis(1), sample_indices),
            self.feature_ids.clone(),
            ids,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_count_matrix_creation() {
        let counts = array![[10.0, 20.0, 30.0], [5.0, 15.0, 25.0]];
        let feature_ids = vec!["f1".to_string(), "f2".to_string()];
        let sample_ids = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];

        let matrix = CountMatrix::new(counts, feature_ids, sample_ids).unwrap();
        assert_eq!(matrix.n_features(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.library_sizes(), vec![15.0, 35.0, 55.0]);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let counts = array![[10.0, -5.0], [5.0, 15.0]];
        let feature_ids = vec!["f1".to_string(), "f2".to_string()];
        let sample_ids = vec!["s1".to_string(), "s2".to_string()];

        assert!(matches!(
            CountMatrix::new(counts, feature_ids, sample_ids),
            Err(BatchError::InvalidCountMatrix { .. })
        ));
    }

    #[test]
    fn test_duplicate_feature_ids_renamed() {
        let counts = array![[1.0], [2.0], [3.0]];
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let matrix = CountMatrix::new(counts, ids, vec!["s1".to_string()]).unwrap();
        assert_eq!(matrix.feature_ids(), &["a", "b", "a_1"]);
    }

    #[test]
    fn test_filter_low_counts() {
        let counts = array![
            [10.0, 12.0, 15.0, 0.0],
            [1.0, 2.0, 0.0, 50.0],
            [30.0, 40.0, 50.0, 60.0]
        ];
        let ids = vec!["f1".to_string(), "f2".to_string(), "f3".to_string()];
        let samples = (1..=4).map(|i| format!("s{}", i)).collect();
        let matrix = CountMatrix::new(counts, ids, samples).unwrap();

        let filtered = matrix.filter_low_counts(10.0, 3).unwrap();
        assert_eq!(filtered.feature_ids(), &["f1", "f3"]);
        assert!(matrix.filter_low_counts(100.0, 1).is_err());
    }
}
