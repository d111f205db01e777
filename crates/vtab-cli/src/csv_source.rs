//! Load a folder of CSV files into a memory datasource.
//!
//! Every `*.csv` file becomes one table named after the file stem. The first
//! column holds entity identifiers; the remaining columns become variables
//! whose type is the narrowest of integer, decimal, boolean, date and text
//! that parses every non-blank cell.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use vtab_model::{MemoryDatasource, Value, ValueType, Variable, VariableEntity};

/// Types tried in order when inferring a column.
const CANDIDATES: [ValueType; 4] = [
    ValueType::Integer,
    ValueType::Decimal,
    ValueType::Boolean,
    ValueType::Date,
];

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub entity_type: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            entity_type: "Participant".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// CSV files directly inside `dir`, sorted by path.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read directory: {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("read directory entry: {}", dir.display()))?
            .path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read a CSV file; the first non-empty row is the header.
pub fn read_csv_table(path: &Path, delimiter: u8) -> Result<CsvTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("read csv: {}", path.display()))?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read record: {}", path.display()))?;
        let row: Vec<String> = record.iter().map(normalize_cell).collect();
        if row.iter().all(String::is_empty) {
            continue;
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Ok(CsvTable {
            headers: Vec::new(),
            rows: Vec::new(),
        });
    }
    let headers = rows
        .remove(0)
        .iter()
        .map(|value| normalize_header(value))
        .collect();
    Ok(CsvTable { headers, rows })
}

/// Narrowest type that parses every non-blank cell of `column`.
pub fn infer_value_type(table: &CsvTable, column: usize) -> ValueType {
    let cells: Vec<&str> = table
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(String::as_str)
        .filter(|cell| !cell.is_empty())
        .collect();
    if cells.is_empty() {
        return ValueType::Text;
    }
    CANDIDATES
        .into_iter()
        .find(|value_type| cells.iter().all(|cell| value_type.value_of(cell).is_ok()))
        .unwrap_or(ValueType::Text)
}

/// Load every CSV file in `dir` into a datasource named after the folder.
pub fn load_directory(dir: &Path, options: &CsvOptions) -> Result<MemoryDatasource> {
    let name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("csv");
    let datasource = MemoryDatasource::new(name);
    for path in list_csv_files(dir)? {
        load_file(&datasource, &path, options)?;
    }
    info!(datasource = name, dir = %dir.display(), "loaded csv folder");
    Ok(datasource)
}

/// Load one CSV file as a table of `datasource`.
pub fn load_file(datasource: &MemoryDatasource, path: &Path, options: &CsvOptions) -> Result<()> {
    let Some(table_name) = path.file_stem().and_then(|stem| stem.to_str()) else {
        bail!("unusable file name: {}", path.display());
    };
    let csv = read_csv_table(path, options.delimiter)?;
    if csv.headers.is_empty() {
        warn!(file = %path.display(), "skipping empty csv file");
        return Ok(());
    }

    let mut headers = BTreeSet::new();
    for (index, header) in csv.headers.iter().enumerate() {
        if !headers.insert(header.as_str()) {
            bail!(
                "duplicate column '{header}' in {} (column {})",
                path.display(),
                index + 1
            );
        }
    }

    let table = datasource
        .create_table(table_name, &options.entity_type)
        .with_context(|| format!("create table {table_name}"))?;
    let mut columns = Vec::with_capacity(csv.headers.len().saturating_sub(1));
    for (index, header) in csv.headers.iter().enumerate().skip(1) {
        let value_type = infer_value_type(&csv, index);
        let variable = Variable::builder(header.as_str(), value_type, &options.entity_type)
            .build()
            .with_context(|| format!("column {header} of {}", path.display()))?;
        table
            .add_variable(variable)
            .with_context(|| format!("column {header} of {}", path.display()))?;
        columns.push((index, header.as_str(), value_type));
    }

    let mut seen = BTreeSet::new();
    for (line, row) in csv.rows.iter().enumerate() {
        let identifier = row.first().map(String::as_str).unwrap_or_default();
        if identifier.is_empty() {
            warn!(file = %path.display(), row = line + 2, "skipping row without identifier");
            continue;
        }
        if !seen.insert(identifier) {
            bail!(
                "duplicate identifier '{identifier}' in {} (row {})",
                path.display(),
                line + 2
            );
        }
        let entity = VariableEntity::new(options.entity_type.as_str(), identifier);
        let mut values: Vec<(String, Value)> = Vec::with_capacity(columns.len());
        for &(index, name, value_type) in &columns {
            let cell = row.get(index).map(String::as_str).unwrap_or_default();
            // blank text cells are missing values, not empty strings
            let value = if cell.is_empty() {
                value_type.null_value()
            } else {
                value_type
                    .value_of(cell)
                    .with_context(|| format!("column {name} of {}", path.display()))?
            };
            values.push((name.to_string(), value));
        }
        table.add_entity(entity.clone())?;
        table.commit_value_set(&entity, values)?;
    }
    debug!(
        table = table_name,
        variables = columns.len(),
        entities = seen.len(),
        "loaded csv table"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> CsvTable {
        CsvTable {
            headers: vec!["id".to_string(), "value".to_string()],
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn headers_collapse_whitespace_and_bom() {
        assert_eq!(normalize_header("\u{feff} Visit   Date "), "Visit Date");
        assert_eq!(normalize_cell("  42 "), "42");
    }

    #[test]
    fn inference_prefers_narrow_types() {
        assert_eq!(infer_value_type(&table(&[&["1", "4"], &["2", ""]]), 1), ValueType::Integer);
        assert_eq!(infer_value_type(&table(&[&["1", "4"], &["2", "4.5"]]), 1), ValueType::Decimal);
        assert_eq!(infer_value_type(&table(&[&["1", "true"], &["2", "false"]]), 1), ValueType::Boolean);
        assert_eq!(infer_value_type(&table(&[&["1", "2024-01-31"]]), 1), ValueType::Date);
        assert_eq!(infer_value_type(&table(&[&["1", "4"], &["2", "n/a"]]), 1), ValueType::Text);
    }

    #[test]
    fn blank_column_is_text() {
        assert_eq!(infer_value_type(&table(&[&["1", ""], &["2", ""]]), 1), ValueType::Text);
    }
}
