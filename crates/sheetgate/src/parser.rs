//! Data row parsing

use std::sync::Arc;

use crate::coerce::Coercer;
use crate::format::SheetView;
use crate::record::{ParsedRows, Record};
use crate::resolver::ColumnMappings;
use crate::result::RowErrorSet;
use crate::schema::Schema;

/// Rows parsed from one sheet, with the coercion errors met along the way
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub rows: ParsedRows,
    /// Coercion errors keyed by sheet row
    pub errors: RowErrorSet,
    /// 1-based footer row that ended the data
    pub footer_row: Option<u32>,
}

impl ParseOutcome {
    /// Whether more rows were found than `max_rows`
    pub fn exceeds(&self, max_rows: usize) -> bool {
        self.rows.len() > max_rows
    }
}

/// Walks the data rows of a sheet and coerces mapped cells
pub struct RowParser<'a> {
    schema: &'a Schema,
    mappings: &'a ColumnMappings,
    max_rows: usize,
}

impl<'a> RowParser<'a> {
    pub fn new(schema: &'a Schema, mappings: &'a ColumnMappings, max_rows: usize) -> Self {
        Self {
            schema,
            mappings,
            max_rows,
        }
    }

    /// Parse from the configured data start row to the end of the sheet
    ///
    /// Stops at a footer row, or as soon as one row more than `max_rows` has
    /// been collected.
    pub fn parse(&self, view: &SheetView<'_>) -> ParseOutcome {
        let sheet = view.sheet();
        let coercer = Coercer::new(view.date_system());
        let names: Arc<[String]> = self.schema.field_names().into();
        let footer = self
            .schema
            .config
            .footer_marker
            .as_deref()
            .filter(|m| !m.is_empty());

        let mut outcome = ParseOutcome::default();
        let first = self.schema.config.data_start_row.saturating_sub(1);
        let Some(last) = sheet.last_row() else {
            return outcome;
        };

        for row in first..=last {
            if let Some(marker) = footer {
                if row_contains(view, row, marker) {
                    log::debug!("footer '{}' found at row {}; stopping", marker, row + 1);
                    outcome.footer_row = Some(row + 1);
                    break;
                }
            }
            if is_blank_row(view, row) {
                continue;
            }

            let row_number = row + 1;
            let mut record = Record::new(names.clone());
            for mapping in self.mappings.iter() {
                let Some(field) = self.schema.fields.get(mapping.field_index) else {
                    continue;
                };
                let (value, style) = view.cell(row, mapping.column_index);
                let result = coercer.coerce(
                    &value,
                    view.is_date_style(style),
                    field.field_type,
                    mapping.spec.format.as_deref(),
                );
                match result {
                    Ok(value) => record.set_at(mapping.field_index, value),
                    Err(e) => outcome
                        .errors
                        .add(row_number, mapping.cell_error(e.raw, e.message)),
                }
            }
            outcome.rows.push(record, row_number);

            if outcome.rows.len() > self.max_rows {
                log::debug!("row limit {} passed at row {}", self.max_rows, row_number);
                break;
            }
        }

        log::debug!(
            "parsed {} rows from '{}' ({} with coercion errors)",
            outcome.rows.len(),
            sheet.name(),
            outcome.errors.row_count()
        );
        outcome
    }
}

fn row_cols(view: &SheetView<'_>, row: u32) -> Vec<u16> {
    let sheet = view.sheet();
    let mut cols: Vec<u16> = sheet.row_cells(row).map(|(col, _)| col).collect();
    for region in sheet.merged_regions() {
        if region.start.row < row && row <= region.end.row {
            cols.extend(region.start.col..=region.end.col);
        }
    }
    cols.sort_unstable();
    cols.dedup();
    cols
}

fn row_contains(view: &SheetView<'_>, row: u32, marker: &str) -> bool {
    row_cols(view, row)
        .into_iter()
        .any(|col| view.text(row, col).contains(marker))
}

/// Every cell of the row is empty or whitespace
fn is_blank_row(view: &SheetView<'_>, row: u32) -> bool {
    row_cols(view, row)
        .into_iter()
        .all(|col| view.text(row, col).trim().is_empty())
}
