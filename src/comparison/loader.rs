//! Load comparison definitions from a raw table

use std::collections::HashMap;
use std::path::Path;

use super::ComparisonSpec;
use crate::error::{BatchError, Result};
use crate::io::{read_table_file, RawRow, RawTable};

/// Header names of the comparison table columns
#[derive(Debug, Clone)]
pub struct SpecColumns {
    pub id: String,
    pub hold_constant_factor: String,
    pub hold_constant_value: String,
    pub varying_factor: String,
    pub level_a: String,
    pub level_b: String,
}

impl Default for SpecColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            hold_constant_factor: "holdConstantFactor".to_string(),
            hold_constant_value: "holdConstantValue".to_string(),
            varying_factor: "varyingFactor".to_string(),
            level_a: "levelA".to_string(),
            level_b: "levelB".to_string(),
        }
    }
}

impl SpecColumns {
    fn names(&self) -> [&str; 6] {
        [
            &self.id,
            &self.hold_constant_factor,
            &self.hold_constant_value,
            &self.varying_factor,
            &self.level_a,
            &self.level_b,
        ]
    }
}

/// Parse a comparison table into specs, in row order.
///
/// Fully blank rows are dropped. Any other row must have every required cell
/// filled, and ids must be unique.
pub fn load_comparison_specs(table: &RawTable, columns: &SpecColumns) -> Result<Vec<ComparisonSpec>> {
    let rows: Vec<&RawRow> = table.rows.iter().filter(|r| !r.is_blank()).collect();
    let dropped = table.rows.len() - rows.len();
    if dropped > 0 {
        log::debug!("Dropped {} blank comparison rows", dropped);
    }
    if rows.is_empty() {
        log::warn!("Comparison table has no data rows");
        return Ok(Vec::new());
    }

    let mut indices = [0usize; 6];
    for (slot, name) in indices.iter_mut().zip(columns.names()) {
        *slot = table.column_index(name).ok_or_else(|| BatchError::MalformedSpec {
            row: rows[0].line,
            reason: format!("required column '{}' is missing from the header", name),
        })?;
    }

    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut specs = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = [""; 6];
        for ((value, &idx), name) in values.iter_mut().zip(&indices).zip(columns.names()) {
            *value = row.cell(idx).trim();
            if value.is_empty() {
                return Err(BatchError::MalformedSpec {
                    row: row.line,
                    reason: format!("required cell '{}' is empty", name),
                });
            }
        }
        let [id, hc_factor, hc_value, varying, level_a, level_b] = values;

        if let Some(&first_row) = first_seen.get(id) {
            return Err(BatchError::DuplicateSpec {
                id: id.to_string(),
                first_row,
                row: row.line,
            });
        }
        first_seen.insert(id.to_string(), row.line);

        specs.push(ComparisonSpec {
            id: id.to_string(),
            hold_constant_factor: hc_factor.to_string(),
            hold_constant_value: hc_value.to_string(),
            varying_factor: varying.to_string(),
            level_a: level_a.to_string(),
            level_b: level_b.to_string(),
            row: row.line,
        });
    }

    log::info!("Loaded {} comparison specs", specs.len());
    Ok(specs)
}

/// Read and parse a comparison table file, skipping `skip_rows` leading lines
pub fn load_comparison_specs_file<P: AsRef<Path>>(
    path: P,
    skip_rows: usize,
    columns: &SpecColumns,
) -> Result<Vec<ComparisonSpec>> {
    let table = read_table_file(path, skip_rows)?;
    load_comparison_specs(&table, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_table;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "id,holdConstantFactor,holdConstantValue,varyingFactor,levelA,levelB";

    fn load(text: &str) -> Result<Vec<ComparisonSpec>> {
        let table = read_table(text.as_bytes(), 0)?;
        load_comparison_specs(&table, &SpecColumns::default())
    }

    #[test]
    fn test_blank_row_is_dropped() {
        let text = format!(
            "{}\ncmp1,tlr,on,dendrimer,control,galnac\n,,,,,\ncmp2,tlr,off,dendrimer,control,galnac\n",
            HEADER
        );
        let specs = load(&text).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].id, "cmp1");
        assert_eq!(specs[1].id, "cmp2");
        assert_eq!(specs[1].row, 4);
    }

    #[test]
    fn test_preserves_row_order_and_trims() {
        let text = format!(
            "{}\nz, tlr ,on,dendrimer,control,galnac\na,dendrimer,galnac,tlr, on ,off\n",
            HEADER
        );
        let specs = load(&text).unwrap();
        let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
        assert_eq!(specs[0].hold_constant_factor, "tlr");
        assert_eq!(specs[1].level_a, "on");
    }

    #[test]
    fn test_missing_cell_is_malformed() {
        let text = format!("{}\ncmp1,tlr,on,dendrimer,,galnac\n", HEADER);
        match load(&text) {
            Err(BatchError::MalformedSpec { row, reason }) => {
                assert_eq!(row, 2);
                assert!(reason.contains("levelA"));
            }
            other => panic!("expected MalformedSpec, got {:?}", other),
        }
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let text = format!("{}\ncmp1,tlr,on,dendrimer\n", HEADER);
        assert!(matches!(load(&text), Err(BatchError::MalformedSpec { .. })));
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let text = "id,holdConstantFactor,holdConstantValue,varyingFactor,levelA\ncmp1,tlr,on,dendrimer,control\n";
        assert!(matches!(load(text), Err(BatchError::MalformedSpec { .. })));
    }

    #[test]
    fn test_duplicate_id() {
        let text = format!(
            "{}\ncmp1,tlr,on,dendrimer,control,galnac\ncmp1,tlr,off,dendrimer,control,galnac\n",
            HEADER
        );
        match load(&text) {
            Err(BatchError::DuplicateSpec { id, first_row, row }) => {
                assert_eq!(id, "cmp1");
                assert_eq!((first_row, row), (2, 3));
            }
            other => panic!("expected DuplicateSpec, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_columns_and_skipped_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Comparison plan v2").unwrap();
        writeln!(file, "name\tfixed\tfixed_value\tvary\ta\tb\tnotes").unwrap();
        writeln!(file, "c1\ttlr\ton\tdendrimer\tcontrol\tgalnac\tfirst").unwrap();
        writeln!(file, "\t\t\t\t\t\t").unwrap();

        let columns = SpecColumns {
            id: "name".to_string(),
            hold_constant_factor: "fixed".to_string(),
            hold_constant_value: "fixed_value".to_string(),
            varying_factor: "vary".to_string(),
            level_a: "a".to_string(),
            level_b: "b".to_string(),
        };
        let specs = load_comparison_specs_file(file.path(), 1, &columns).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].row, 3);
        assert_eq!(specs[0].contrast().to_string(), "dendrimer: control vs galnac");
    }
}
