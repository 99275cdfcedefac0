//! deseq2_batch: batches of DESeq2-style differential abundance comparisons
//!
//! A comparison table describes, row by row, which samples to hold constant
//! and which two levels of a varying factor to contrast. Every comparison is
//! fitted against one shared, filtered dataset, and a failing comparison is
//! recorded without stopping the rest of the batch.
//!
//! # Example
//!
//! ```ignore
//! use deseq2_batch::prelude::*;
//!
//! let base = load_base_dataset("counts.csv", "metadata.csv", &LowCountFilter::default())?;
//! let specs = load_comparison_specs_file("comparisons.csv", 0, &SpecColumns::default())?;
//!
//! let orchestrator = BatchOrchestrator::new(BatchConfig::default());
//! let outcome = orchestrator.run(&specs, &base, &NoNames, &DirectoryPersister::new("results")?);
//! println!("{}", BatchSummary::new(&outcome, 10, 0.05));
//! ```

pub mod cli;
pub mod comparison;
pub mod data;
pub mod dispersion;
pub mod engine;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod model;
pub mod normalization;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::comparison::{load_comparison_specs, load_comparison_specs_file, ComparisonSpec, SpecColumns};
    pub use crate::data::{BaseDataset, CountMatrix, LowCountFilter, SampleMetadata, SubsetDataset};
    pub use crate::dispersion::DispersionParams;
    pub use crate::engine::{
        prepare_contrast, write_reports, ArtifactPersister, BatchConfig, BatchOrchestrator, BatchOutcome, BatchSummary, CancelToken,
        ContrastEngine, ContrastFitter, DatasetSubsetter, DirectoryPersister, FailureRecord, FeatureLookup,
        NameTable, NbGlmEngine, NoNames, NoopPersister, PlotOptions,
    };
    pub use crate::error::{BatchError, ErrorKind, Result};
    pub use crate::glm::GlmFitParams;
    pub use crate::io::{read_count_matrix, read_metadata, Contrast, ContrastResult, FeatureRecord};
    pub use crate::model::{ModelFormula, ModelSelector, VaryingFactor};
    pub use crate::testing::WaldParams;
}

use std::path::Path;

use prelude::*;

/// Read counts and metadata, align samples and apply the low-count filter.
///
/// The returned dataset is the shared baseline for every comparison.
pub fn load_base_dataset<P: AsRef<Path>, Q: AsRef<Path>>(
    counts_path: P,
    metadata_path: Q,
    filter: &LowCountFilter,
) -> Result<BaseDataset> {
    log::info!("Loading count matrix from: {}", counts_path.as_ref().display());
    let counts = read_count_matrix(counts_path)?;
    log::info!("  {} features, {} samples", counts.n_features(), counts.n_samples());
    let sizes = counts.library_sizes();
    log::debug!(
        "  library sizes {:.0} to {:.0}",
        sizes.iter().copied().fold(f64::INFINITY, f64::min),
        sizes.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    );

    log::info!("Loading metadata from: {}", metadata_path.as_ref().display());
    let metadata = read_metadata(metadata_path)?;
    log::info!("  factors: {}", metadata.factor_names().join(", "));

    BaseDataset::aligned(counts, metadata)?.filter_low_counts(filter)
}
