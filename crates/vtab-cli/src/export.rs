//! CSV output for value tables.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use csv::WriterBuilder;

use vtab_model::{ValueTable, Variable};

/// One rendered row: entity identifier followed by one cell per variable.
pub type Row = Vec<String>;

/// Header and rows of `table`, in variable and entity order.
///
/// `limit` caps the number of rows. Null values render as empty cells.
pub fn render_rows(
    table: &(dyn ValueTable + 'static),
    limit: Option<usize>,
) -> Result<(Vec<Variable>, Vec<Row>)> {
    let variables = table
        .variables()
        .with_context(|| format!("variables of {}", table.name()))?;
    let value_sets = table
        .value_sets()
        .with_context(|| format!("value sets of {}", table.name()))?;
    let mut rows = Vec::new();
    for value_set in value_sets.iter().take(limit.unwrap_or(usize::MAX)) {
        let mut row = Vec::with_capacity(variables.len() + 1);
        row.push(value_set.entity().identifier().to_string());
        for variable in &variables {
            let value = table
                .value(value_set, variable.name())
                .with_context(|| format!("{} of {value_set}", variable.name()))?;
            row.push(value.to_text().unwrap_or_default());
        }
        rows.push(row);
    }
    Ok((variables, rows))
}

/// Write `table` as CSV to `writer`. Returns the number of data rows.
pub fn write_csv<W: Write>(
    table: &(dyn ValueTable + 'static),
    writer: W,
    delimiter: u8,
) -> Result<usize> {
    let (variables, rows) = render_rows(table, None)?;
    let mut csv = WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    let mut header = Vec::with_capacity(variables.len() + 1);
    header.push("entity");
    header.extend(variables.iter().map(Variable::name));
    csv.write_record(&header).context("write csv header")?;
    for row in &rows {
        csv.write_record(row).context("write csv row")?;
    }
    csv.flush().context("flush csv")?;
    Ok(rows.len())
}

/// Write `table` as CSV to `path`, creating parent directories.
pub fn write_csv_file(
    table: &(dyn ValueTable + 'static),
    path: &Path,
    delimiter: u8,
) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory: {}", parent.display()))?;
    }
    let file =
        fs::File::create(path).with_context(|| format!("create file: {}", path.display()))?;
    write_csv(table, file, delimiter)
}
