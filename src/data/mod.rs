//! Data structures for counts, sample metadata and datasets

mod count_matrix;
mod dataset;
mod metadata;

pub use count_matrix::CountMatrix;
pub use dataset::{BaseDataset, LowCountFilter, SubsetDataset};
pub use metadata::SampleMetadata;
