//! The batch comparison engine: subset, model, fit, annotate, persist, report

mod annotate;
mod fitter;
mod orchestrator;
mod persist;
mod plot;
mod report;
mod subset;

pub use annotate::{annotate, FeatureLookup, NameTable, NoNames};
pub use fitter::{prepare_contrast, ContrastEngine, ContrastFitter, FittedContrast, NbGlmEngine};
pub use orchestrator::{BatchConfig, BatchOrchestrator, BatchOutcome, CancelToken, ComparisonOutcome, FailureRecord};
pub use persist::{file_stem, COMPARISONS_DIR, ArtifactPersister, Artifacts, DirectoryPersister, NoopPersister};
pub use plot::{volcano_plot, write_volcano, PlotOptions};
pub use report::{significant_sets, write_reports, BatchSummary, ComparisonSummary, OverlapTable, SignificantSet};
pub use subset::DatasetSubsetter;
