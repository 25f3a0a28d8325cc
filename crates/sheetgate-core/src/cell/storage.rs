//! Sparse cell storage
//!
//! Only non-empty cells are stored, in a row-major `BTreeMap` so rows come back
//! in ascending order for streaming writes and sequential parsing.

use std::collections::BTreeMap;

use super::{CellRange, CellValue};

/// Value and style of a single cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellData {
    /// The cell's value
    pub value: CellValue,
    /// Index into the workbook style pool (0 = default style)
    pub style_index: u32,
}

impl CellData {
    /// Create a new cell with a value and default style
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            style_index: 0,
        }
    }

    /// Create a new cell with a value and style
    pub fn with_style(value: CellValue, style_index: u32) -> Self {
        Self { value, style_index }
    }

    /// A cell carrying no value and the default style is not worth storing
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.style_index == 0
    }
}

/// Sparse row-based storage for worksheet cells and sheet layout
///
/// Structure: `BTreeMap<row_index, BTreeMap<col_index, CellData>>`
#[derive(Debug, Default, Clone)]
pub struct CellStorage {
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,
    row_heights: BTreeMap<u32, f64>,
    hidden_rows: BTreeMap<u32, bool>,
    column_widths: BTreeMap<u16, f64>,
    hidden_columns: BTreeMap<u16, bool>,
    merged_regions: Vec<CellRange>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Store a cell; empty data removes it
    pub fn set(&mut self, row: u32, col: u16, data: CellData) {
        if data.is_empty() {
            self.remove(row, col);
        } else {
            self.rows.entry(row).or_default().insert(col, data);
        }
    }

    /// Set just the cell value (preserving style)
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        match self.get_mut(row, col) {
            Some(cell) => {
                cell.value = value;
                if cell.is_empty() {
                    self.remove(row, col);
                }
            }
            None if !value.is_empty() => self.set(row, col, CellData::new(value)),
            None => {}
        }
    }

    /// Set just the cell style (preserving value)
    pub fn set_style(&mut self, row: u32, col: u16, style_index: u32) {
        match self.get_mut(row, col) {
            Some(cell) => {
                cell.style_index = style_index;
                if cell.is_empty() {
                    self.remove(row, col);
                }
            }
            None if style_index != 0 => {
                self.set(row, col, CellData::with_style(CellValue::Empty, style_index))
            }
            None => {}
        }
    }

    /// Remove a cell, dropping its row when it becomes empty
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let removed = self.rows.get_mut(&row).and_then(|r| r.remove(&col));
        if self.rows.get(&row).map_or(false, |r| r.is_empty()) {
            self.rows.remove(&row);
        }
        removed
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if no cell is stored
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bounds of stored cells as (min_row, min_col, max_row, max_col)
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        for row_data in self.rows.values() {
            if let Some(&col) = row_data.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = row_data.keys().next_back() {
                max_col = max_col.max(col);
            }
        }

        Some((min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, data)| (row, col, data)))
    }

    /// Iterate over the cells of one row in column order
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &CellData)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&col, data)| (col, data)))
    }

    /// Row indices that hold at least one cell, ascending
    pub fn row_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.keys().copied()
    }

    /// Highest row index holding a cell
    pub fn last_row(&self) -> Option<u32> {
        self.rows.keys().next_back().copied()
    }

    /// Custom row height in points, if one was set
    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    /// Set a custom row height in points
    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.row_heights.insert(row, height);
    }

    /// All custom row heights
    pub fn row_heights(&self) -> &BTreeMap<u32, f64> {
        &self.row_heights
    }

    /// Check if a row is hidden
    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.hidden_rows.get(&row).copied().unwrap_or(false)
    }

    /// Set row hidden state
    pub fn set_row_hidden(&mut self, row: u32, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row, true);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    /// All hidden rows
    pub fn hidden_rows(&self) -> &BTreeMap<u32, bool> {
        &self.hidden_rows
    }

    /// Custom column width in characters, if one was set
    pub fn column_width(&self, col: u16) -> Option<f64> {
        self.column_widths.get(&col).copied()
    }

    /// Set a custom column width in characters
    pub fn set_column_width(&mut self, col: u16, width: f64) {
        self.column_widths.insert(col, width);
    }

    /// All custom column widths
    pub fn column_widths(&self) -> &BTreeMap<u16, f64> {
        &self.column_widths
    }

    /// Check if a column is hidden
    pub fn is_column_hidden(&self, col: u16) -> bool {
        self.hidden_columns.get(&col).copied().unwrap_or(false)
    }

    /// Set column hidden state
    pub fn set_column_hidden(&mut self, col: u16, hidden: bool) {
        if hidden {
            self.hidden_columns.insert(col, true);
        } else {
            self.hidden_columns.remove(&col);
        }
    }

    /// All hidden columns
    pub fn hidden_columns(&self) -> &BTreeMap<u16, bool> {
        &self.hidden_columns
    }

    /// Merged regions in insertion order
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    pub(crate) fn push_merged_region(&mut self, range: CellRange) {
        self.merged_regions.push(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_remove_empty() {
        let mut storage = CellStorage::new();
        storage.set_value(2, 3, CellValue::from("x"));
        assert_eq!(storage.cell_count(), 1);
        assert_eq!(storage.last_row(), Some(2));

        storage.set_value(2, 3, CellValue::Empty);
        assert!(storage.is_empty());
        assert_eq!(storage.last_row(), None);
    }

    #[test]
    fn test_style_only_cell_is_kept() {
        let mut storage = CellStorage::new();
        storage.set_style(0, 0, 4);
        assert_eq!(storage.get(0, 0).map(|c| c.style_index), Some(4));

        storage.set_style(0, 0, 0);
        assert!(storage.get(0, 0).is_none());
    }

    #[test]
    fn test_used_bounds_and_row_order() {
        let mut storage = CellStorage::new();
        storage.set_value(5, 1, CellValue::from(1.0));
        storage.set_value(1, 4, CellValue::from(2.0));
        storage.set_value(3, 0, CellValue::from(3.0));

        assert_eq!(storage.used_bounds(), Some((1, 0, 5, 4)));
        assert_eq!(storage.row_indices().collect::<Vec<_>>(), vec![1, 3, 5]);
    }
}
