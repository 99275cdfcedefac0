//! Input/Output operations

mod csv;
mod results;

pub use self::csv::{
    read_count_matrix, read_feature_names, read_metadata, read_table, read_table_file,
    write_result_table, RawRow, RawTable,
};
pub use results::{Contrast, ContrastResult, FeatureRecord, ResultsSummary};
