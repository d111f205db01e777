use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use vtab_cli::commands::{ExportResult, ShowResult, TableSummary};

pub fn print_tables(summaries: &[TableSummary]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Name"),
        header_cell("Kind"),
        header_cell("Entity type"),
        header_cell("Variables"),
        header_cell("Entities"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for summary in summaries {
        let kind = if summary.is_view {
            Cell::new("view").fg(Color::Magenta)
        } else {
            Cell::new("table").fg(Color::Blue)
        };
        table.add_row(vec![
            Cell::new(&summary.name).add_attribute(Attribute::Bold),
            kind,
            Cell::new(&summary.entity_type),
            Cell::new(summary.variables),
            Cell::new(summary.entities),
        ]);
    }
    println!("{table}");
}

pub fn print_show(result: &ShowResult) {
    let mut table = Table::new();
    let mut header = vec![header_cell("entity")];
    header.extend(
        result
            .variables
            .iter()
            .map(|variable| header_cell(variable.name())),
    );
    table.set_header(header);
    apply_table_style(&mut table);
    for row in &result.rows {
        let cells: Vec<Cell> = row
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    dim_cell("-")
                } else {
                    Cell::new(cell)
                }
            })
            .collect();
        table.add_row(cells);
    }
    println!("{table}");
    if result.rows.len() < result.total {
        println!("{}: showing {} of {} rows", result.table, result.rows.len(), result.total);
    } else {
        println!("{}: {} rows", result.table, result.total);
    }
}

pub fn print_export(result: &ExportResult) {
    println!(
        "Exported {} ({} variables, {} rows) to {}",
        result.report.source,
        result.report.variables,
        result.rows,
        result.path.display()
    );
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
