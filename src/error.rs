//! Error types for batch comparisons

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for loading inputs and running comparisons
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Malformed comparison spec at row {row}: {reason}")]
    MalformedSpec { row: usize, reason: String },

    #[error("Duplicate comparison id '{id}' at rows {first_row} and {row}")]
    DuplicateSpec {
        id: String,
        first_row: usize,
        row: usize,
    },

    #[error("Unknown factor '{factor}': not a sample metadata column")]
    UnknownFactor { factor: String },

    #[error("No samples where {factor} == '{value}'")]
    EmptySubset { factor: String, value: String },

    #[error("Unsupported varying factor '{factor}' (supported: {supported})")]
    UnsupportedFactor { factor: String, supported: String },

    #[error("Invalid contrast specification: {reason}")]
    InvalidContrast { reason: String },

    #[error("Model fit did not converge: {reason}")]
    FitConvergence { reason: String },

    #[error("Comparison failed: {reason}")]
    ComparisonFailed { reason: String },

    #[error("Comparison cancelled before it started")]
    Cancelled,

    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Sample mismatch between counts and metadata: {reason}")]
    SampleMismatch { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Size factor estimation failed: {reason}")]
    SizeFactorFailed { reason: String },

    #[error("Dispersion estimation failed: {reason}")]
    DispersionEstimationFailed { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Category recorded for a failed comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedSpec,
    DuplicateSpec,
    UnknownFactor,
    EmptySubset,
    UnsupportedFactor,
    InvalidContrast,
    FitConvergence,
    Cancelled,
    /// Anything else raised while a single comparison was running
    ComparisonFailed,
}

impl BatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::MalformedSpec { .. } => ErrorKind::MalformedSpec,
            BatchError::DuplicateSpec { .. } => ErrorKind::DuplicateSpec,
            BatchError::UnknownFactor { .. } => ErrorKind::UnknownFactor,
            BatchError::EmptySubset { .. } => ErrorKind::EmptySubset,
            BatchError::UnsupportedFactor { .. } => ErrorKind::UnsupportedFactor,
            BatchError::InvalidContrast { .. } => ErrorKind::InvalidContrast,
            BatchError::FitConvergence { .. } => ErrorKind::FitConvergence,
            BatchError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::ComparisonFailed,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedSpec => "MalformedSpec",
            ErrorKind::DuplicateSpec => "DuplicateSpec",
            ErrorKind::UnknownFactor => "UnknownFactor",
            ErrorKind::EmptySubset => "EmptySubset",
            ErrorKind::UnsupportedFactor => "UnsupportedFactor",
            ErrorKind::InvalidContrast => "InvalidContrast",
            ErrorKind::FitConvergence => "FitConvergence",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::ComparisonFailed => "ComparisonFailed",
        };
        f.write_str(name)
    }
}

/// Result type alias for batch operations
pub type Result<T> = std::result::Result<T, BatchError>;
