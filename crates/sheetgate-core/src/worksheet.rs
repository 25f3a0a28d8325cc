//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellData, CellRange, CellStorage, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// Default row height in points
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;

/// Default column width in characters
pub const DEFAULT_COLUMN_WIDTH: f64 = 8.43;

/// A worksheet (single sheet in a workbook)
///
/// Cells carry style indices into the owning workbook's [`StylePool`](crate::StylePool).
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: CellStorage,
    visible: bool,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
            visible: true,
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if sheet is visible
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Set sheet visibility
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    // === Cell Access ===

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Get a cell value by address string
    pub fn value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.value_at(addr.row, addr.col))
    }

    /// Get a cell value by indices (empty when the cell is absent)
    pub fn value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Style index of a cell (0 when the cell is absent)
    pub fn style_index_at(&self, row: u32, col: u16) -> u32 {
        self.cells.get(row, col).map_or(0, |c| c.style_index)
    }

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        validate_cell_position(row, col)?;
        self.cells.set_value(row, col, value.into());
        Ok(())
    }

    /// Set a cell's style index, keeping its value
    pub fn set_cell_style_index_at(&mut self, row: u32, col: u16, style_index: u32) -> Result<()> {
        validate_cell_position(row, col)?;
        self.cells.set_style(row, col, style_index);
        Ok(())
    }

    /// Replace a cell's value and style at once
    pub fn set_cell_at(&mut self, row: u32, col: u16, data: CellData) -> Result<()> {
        validate_cell_position(row, col)?;
        self.cells.set(row, col, data);
        Ok(())
    }

    /// Clear a cell by indices
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(row, col);
    }

    // === Range Operations ===

    /// Get the used range (bounds of all stored cells)
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    /// Highest row index holding a cell
    pub fn last_row(&self) -> Option<u32> {
        self.cells.last_row()
    }

    /// Row indices holding at least one cell, ascending
    pub fn row_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells.row_indices()
    }

    /// Cells of one row in column order
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (u16, &CellData)> {
        self.cells.iter_row(row)
    }

    /// Iterate over all cells in row order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Check if the worksheet holds no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // === Row/Column Layout ===

    /// Row height in points
    pub fn row_height(&self, row: u32) -> f64 {
        self.cells.row_height(row).unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    /// Set a custom row height in points
    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.cells.set_row_height(row, height);
    }

    /// Check if a row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.cells.is_row_hidden(row)
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        self.cells.set_row_hidden(row, hidden);
    }

    /// Column width in characters
    pub fn column_width(&self, col: u16) -> f64 {
        self.cells.column_width(col).unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    /// Set a custom column width in characters
    pub fn set_column_width(&mut self, col: u16, width: f64) {
        self.cells.set_column_width(col, width);
    }

    /// Check if a column is hidden
    pub fn is_column_hidden(&self, col: u16) -> bool {
        self.cells.is_column_hidden(col)
    }

    /// Set column hidden state
    pub fn set_column_hidden(&mut self, col: u16, hidden: bool) {
        self.cells.set_column_hidden(col, hidden);
    }

    /// Rows with a custom height
    pub fn custom_row_heights(&self) -> &BTreeMap<u32, f64> {
        self.cells.row_heights()
    }

    /// Hidden rows
    pub fn hidden_rows(&self) -> &BTreeMap<u32, bool> {
        self.cells.hidden_rows()
    }

    /// Columns with a custom width
    pub fn custom_column_widths(&self) -> &BTreeMap<u16, f64> {
        self.cells.column_widths()
    }

    /// Hidden columns
    pub fn hidden_columns(&self) -> &BTreeMap<u16, bool> {
        self.cells.hidden_columns()
    }

    // === Merged Cells ===

    /// Get merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        self.cells.merged_regions()
    }

    /// Merge cells; single-cell ranges are ignored
    pub fn merge_cells(&mut self, range: &CellRange) -> Result<()> {
        validate_cell_position(range.end.row, range.end.col)?;
        if range.start == range.end {
            return Ok(());
        }
        if self.cells.merged_regions().iter().any(|r| r.overlaps(range)) {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.cells.push_merged_region(*range);
        Ok(())
    }

    /// Merged region covering a cell, if any
    pub fn merged_region_at(&self, row: u32, col: u16) -> Option<&CellRange> {
        self.cells
            .merged_regions()
            .iter()
            .find(|r| r.contains(row, col))
    }

    /// Value of a cell, falling back to the master cell of its merged region when empty
    pub fn merged_value_at(&self, row: u32, col: u16) -> CellValue {
        let value = self.value_at(row, col);
        if !value.is_empty() {
            return value;
        }
        match self.merged_region_at(row, col) {
            Some(region) => {
                let master = region.top_left();
                self.value_at(master.row, master.col)
            }
            None => value,
        }
    }
}

fn validate_cell_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col as u32, MAX_COLS - 1));
    }
    Ok(())
}
