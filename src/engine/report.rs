//! Batch summary and cross-comparison overlap of significant features

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use super::orchestrator::{BatchOutcome, FailureRecord};
use crate::error::Result;
use crate::io::{Contrast, FeatureRecord, ResultsSummary};

/// One entry of the batch summary
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonSummary {
    Succeeded {
        comparison_id: String,
        formula: String,
        contrast: Contrast,
        summary: ResultsSummary,
        top: Vec<FeatureRecord>,
    },
    Failed(FailureRecord),
}

/// Top rows or failure for every comparison, in spec order
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub alpha: f64,
    pub top_n: usize,
    pub comparisons: Vec<ComparisonSummary>,
}

impl BatchSummary {
    pub fn new(outcome: &BatchOutcome, top_n: usize, alpha: f64) -> Self {
        let comparisons = outcome
            .entries()
            .iter()
            .map(|(_, entry)| match entry {
                Ok(result) => ComparisonSummary::Succeeded {
                    comparison_id: result.comparison_id.clone(),
                    formula: result.formula.clone(),
                    contrast: result.contrast.clone(),
                    summary: result.summary(alpha),
                    top: result.top(top_n).to_vec(),
                },
                Err(failure) => ComparisonSummary::Failed(failure.clone()),
            })
            .collect();
        Self {
            alpha,
            top_n,
            comparisons,
        }
    }

    /// Write as pretty JSON; missing values become null
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

fn fmt_value(x: f64) -> String {
    if x.is_nan() {
        "NA".to_string()
    } else if x != 0.0 && x.abs() < 1e-3 {
        format!("{:.3e}", x)
    } else {
        format!("{:.4}", x)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.comparisons {
            match entry {
                ComparisonSummary::Succeeded {
                    comparison_id,
                    formula,
                    contrast,
                    summary,
                    top,
                } => {
                    writeln!(f, "== {} | {} | {}", comparison_id, contrast, formula)?;
                    writeln!(f, "   {}", summary)?;
                    writeln!(
                        f,
                        "   {:<20} {:<16} {:>10} {:>12} {:>12} {:>12}",
                        "featureId", "name", "effect", "mean", "pValue", "padj"
                    )?;
                    for row in top {
                        writeln!(
                            f,
                            "   {:<20} {:<16} {:>10} {:>12} {:>12} {:>12}",
                            row.feature_id,
                            row.name.as_deref().unwrap_or("NA"),
                            fmt_value(row.effect_size),
                            fmt_value(row.mean_abundance),
                            fmt_value(row.p_value),
                            fmt_value(row.adjusted_p_value)
                        )?;
                    }
                }
                ComparisonSummary::Failed(failure) => {
                    writeln!(
                        f,
                        "== {} | FAILED [{}] {}",
                        failure.comparison_id, failure.kind, failure.message
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Significant features of one successful comparison
#[derive(Debug, Clone, Serialize)]
pub struct SignificantSet {
    pub comparison_id: String,
    pub features: BTreeSet<String>,
}

/// Features with adjusted p < `alpha` and |effect| >= `lfc`, per successful comparison
pub fn significant_sets(outcome: &BatchOutcome, alpha: f64, lfc: f64) -> Vec<SignificantSet> {
    outcome
        .successes()
        .map(|result| SignificantSet {
            comparison_id: result.comparison_id.clone(),
            features: result
                .significant_features(alpha, lfc)
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
        .collect()
}

/// Pairwise intersection sizes; the diagonal holds each set's size
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapTable {
    pub ids: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl OverlapTable {
    pub fn new(sets: &[SignificantSet]) -> Self {
        let counts = sets
            .iter()
            .map(|a| {
                sets.iter()
                    .map(|b| a.features.intersection(&b.features).count())
                    .collect()
            })
            .collect();
        Self {
            ids: sets.iter().map(|s| s.comparison_id.clone()).collect(),
            counts,
        }
    }

    pub fn write_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        let mut header = vec!["comparison".to_string()];
        header.extend(self.ids.iter().cloned());
        wtr.write_record(&header)?;
        for (id, row) in self.ids.iter().zip(&self.counts) {
            let mut record = vec![id.clone()];
            record.extend(row.iter().map(|c| c.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Write `batch_outcome.json`, `significant_sets.json` and `overlap.tsv` into `dir`
pub fn write_reports<P: AsRef<Path>>(
    dir: P,
    outcome: &BatchOutcome,
    summary: &BatchSummary,
    alpha: f64,
    lfc: f64,
) -> Result<()> {
    let dir = dir.as_ref();
    summary.write_json(dir.join("batch_outcome.json"))?;

    let sets = significant_sets(outcome, alpha, lfc);
    let writer = BufWriter::new(File::create(dir.join("significant_sets.json"))?);
    serde_json::to_writer_pretty(writer, &sets)?;

    OverlapTable::new(&sets).write_tsv(dir.join("overlap.tsv"))?;
    log::info!("Wrote batch reports to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(id: &str, features: &[&str]) -> SignificantSet {
        SignificantSet {
            comparison_id: id.to_string(),
            features: features.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_overlap_counts() {
        let sets = vec![set("a", &["f1", "f2", "f3"]), set("b", &["f2", "f3", "f4"]), set("c", &[])];
        let table = OverlapTable::new(&sets);
        assert_eq!(table.ids, vec!["a", "b", "c"]);
        assert_eq!(table.counts, vec![vec![3, 2, 0], vec![2, 3, 0], vec![0, 0, 0]]);
    }

    #[test]
    fn test_overlap_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlap.tsv");
        OverlapTable::new(&[set("a", &["f1"]), set("b", &["f1", "f2"])])
            .write_tsv(&path)
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "comparison\ta\tb\na\t1\t1\nb\t1\t2\n");
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(fmt_value(f64::NAN), "NA");
        assert_eq!(fmt_value(0.5), "0.5000");
        assert_eq!(fmt_value(1.5e-5), "1.500e-5");
    }
}
