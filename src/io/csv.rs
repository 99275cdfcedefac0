//! Delimited-text reading and writing for counts, metadata, name tables and results

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;

use super::results::ContrastResult;
use crate::data::{CountMatrix, SampleMetadata};
use crate::error::{BatchError, Result};

/// One data row of a raw table with its 1-based line number in the source
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    /// True when every cell is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    /// Cell at `idx`, or "" when the row is ragged
    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

/// Header plus string rows, as read from a delimited file
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}

/// Tab if the header line contains a tab, comma otherwise
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Parse delimited text after skipping `skip_rows` leading lines.
///
/// Quoted fields are handled by the csv reader; rows may be ragged.
/// Completely empty lines are skipped by the reader itself, rows made only of
/// delimiters are kept (callers decide what a blank row means).
pub fn read_table<R: Read>(mut reader: R, skip_rows: usize) -> Result<RawTable> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let body = skip_lines(text, skip_rows);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(body))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(BatchError::EmptyData {
            reason: "table has no header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0)
            + skip_rows;
        rows.push(RawRow {
            line,
            cells: record.iter().map(|c| c.to_string()).collect(),
        });
    }

    Ok(RawTable { headers, rows })
}

/// Read a delimited file into a raw table
pub fn read_table_file<P: AsRef<Path>>(path: P, skip_rows: usize) -> Result<RawTable> {
    let path = path.as_ref();
    log::debug!("Reading table {}", path.display());
    read_table(File::open(path)?, skip_rows)
}

/// Read a count matrix.
/// Expected format: first column is feature IDs, header row holds sample IDs
pub fn read_count_matrix<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let table = read_table_file(path, 0)?;
    if table.headers.len() < 2 {
        return Err(BatchError::InvalidCountMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let sample_ids: Vec<String> = table.headers[1..].to_vec();
    let n_samples = sample_ids.len();

    let data_rows: Vec<&RawRow> = table.rows.iter().filter(|r| !r.is_blank()).collect();
    if data_rows.is_empty() {
        return Err(BatchError::EmptyData {
            reason: "No features found in count matrix".to_string(),
        });
    }

    let mut feature_ids = Vec::with_capacity(data_rows.len());
    let mut counts = Array2::zeros((data_rows.len(), n_samples));
    for (i, row) in data_rows.iter().enumerate() {
        if row.cells.len() != n_samples + 1 {
            return Err(BatchError::InvalidCountMatrix {
                reason: format!(
                    "line {}: row has {} columns, expected {}",
                    row.line,
                    row.cells.len(),
                    n_samples + 1
                ),
            });
        }
        feature_ids.push(row.cells[0].clone());
        for (j, value) in row.cells[1..].iter().enumerate() {
            counts[[i, j]] = value.parse::<f64>().map_err(|_| BatchError::InvalidCountMatrix {
                reason: format!("line {}: invalid count value '{}'", row.line, value),
            })?;
        }
    }

    CountMatrix::new(counts, feature_ids, sample_ids)
}

/// Read sample metadata.
/// Expected format: first column is sample IDs, remaining columns are factors
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<SampleMetadata> {
    let table = read_table_file(path, 0)?;
    let factor_names: Vec<String> = table.headers.iter().skip(1).cloned().collect();

    let mut sample_ids = Vec::new();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); factor_names.len()];
    for row in table.rows.iter().filter(|r| !r.is_blank()) {
        if row.cells.len() != factor_names.len() + 1 {
            return Err(BatchError::InvalidMetadata {
                reason: format!(
                    "line {}: row has {} columns, expected {}",
                    row.line,
                    row.cells.len(),
                    factor_names.len() + 1
                ),
            });
        }
        sample_ids.push(row.cells[0].clone());
        for (column, value) in columns.iter_mut().zip(&row.cells[1..]) {
            column.push(value.clone());
        }
    }

    if sample_ids.is_empty() {
        return Err(BatchError::EmptyData {
            reason: "No samples found in metadata".to_string(),
        });
    }

    let mut metadata = SampleMetadata::new(sample_ids);
    for (name, values) in factor_names.iter().zip(columns) {
        metadata.add_factor(name, values)?;
    }
    Ok(metadata)
}

/// Read a feature id -> display name table from two named columns.
/// Rows with an empty name are skipped; the first occurrence of an id wins.
pub fn read_feature_names<P: AsRef<Path>>(
    path: P,
    id_column: &str,
    name_column: &str,
) -> Result<HashMap<String, String>> {
    let table = read_table_file(path, 0)?;
    let missing = |col: &str| BatchError::InvalidInput {
        reason: format!("name table has no column '{}'", col),
    };
    let id_idx = table.column_index(id_column).ok_or_else(|| missing(id_column))?;
    let name_idx = table
        .column_index(name_column)
        .ok_or_else(|| missing(name_column))?;

    let mut names = HashMap::new();
    for row in &table.rows {
        let (id, name) = (row.cell(id_idx), row.cell(name_idx));
        if id.is_empty() || name.is_empty() {
            continue;
        }
        names.entry(id.to_string()).or_insert_with(|| name.to_string());
    }
    log::info!("Loaded {} feature names", names.len());
    Ok(names)
}

fn format_value(x: f64) -> String {
    if x.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", x)
    }
}

/// Write one comparison's result rows as a tab-separated table
pub fn write_result_table<P: AsRef<Path>>(path: P, result: &ContrastResult) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    wtr.write_record([
        "featureId",
        "effectSize",
        "meanAbundance",
        "pValue",
        "adjustedPValue",
        "name",
    ])?;
    for row in &result.rows {
        wtr.write_record([
            row.feature_id.clone(),
            format_value(row.effect_size),
            format_value(row.mean_abundance),
            format_value(row.p_value),
            format_value(row.adjusted_p_value),
            row.name.clone().unwrap_or_else(|| "NA".to_string()),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_count_matrix() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\ts1\ts2\ts3").unwrap();
        writeln!(file, "feat1\t100\t200\t150").unwrap();
        writeln!(file, "feat2\t50\t75\t60").unwrap();

        let matrix = read_count_matrix(file.path()).unwrap();
        assert_eq!(matrix.n_features(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.sample_ids(), &["s1", "s2", "s3"]);
    }

    #[test]
    fn test_read_count_matrix_rejects_text() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,s1,s2").unwrap();
        writeln!(file, "feat1,10,abc").unwrap();
        let err = read_count_matrix(file.path()).unwrap_err();
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_read_metadata_comma_quoted() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample,donor,\"tlr\"").unwrap();
        writeln!(file, "s1,d1,on").unwrap();
        writeln!(file, "s2,\"d, 2\",off").unwrap();

        let meta = read_metadata(file.path()).unwrap();
        assert_eq!(meta.factor_names(), &["donor", "tlr"]);
        assert_eq!(meta.factor("donor").unwrap(), &["d1", "d, 2"]);
    }

    #[test]
    fn test_read_table_skips_rows_and_keeps_line_numbers() {
        let text = "# exported sheet\nnotes\nid,a\nx,1\n,\ny,2\n";
        let table = read_table(text.as_bytes(), 2).unwrap();
        assert_eq!(table.headers, vec!["id", "a"]);
        assert_eq!(table.rows.len(), 3);
        assert!(table.rows[1].is_blank());
        assert_eq!(table.rows[0].line, 4);
        assert_eq!(table.rows[2].line, 6);
    }

    #[test]
    fn test_read_feature_names() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "gene_id\tgene_name\tbiotype").unwrap();
        writeln!(file, "g1\tTP53\tprotein_coding").unwrap();
        writeln!(file, "g2\t\tlncRNA").unwrap();
        writeln!(file, "g1\tOTHER\tprotein_coding").unwrap();

        let names = read_feature_names(file.path(), "gene_id", "gene_name").unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names["g1"], "TP53");
        assert!(read_feature_names(file.path(), "gene_id", "symbol").is_err());
    }
}
