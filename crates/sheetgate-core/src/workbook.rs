//! Workbook type - the main document structure

use crate::date::DateSystem;
use crate::error::{Error, Result};
use crate::style::{Style, StylePool};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook: ordered worksheets sharing one style table and one date system
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    styles: StylePool,
    date_system: DateSystem,
}

impl Workbook {
    /// Create a new workbook with one worksheet named `Sheet1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            styles: StylePool::new(),
            date_system: DateSystem::default(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    /// Get the index of a worksheet by name
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets.iter().position(|ws| ws.name() == name)
    }

    /// Iterate over all worksheets in tab order
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Sheet names in tab order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(|ws| ws.name()).collect()
    }

    /// Add a new worksheet with specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Add an existing worksheet to the workbook
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        Ok(index)
    }

    /// The workbook style table
    pub fn styles(&self) -> &StylePool {
        &self.styles
    }

    /// Mutable access to the workbook style table
    pub fn styles_mut(&mut self) -> &mut StylePool {
        &mut self.styles
    }

    /// Style of a cell, resolved through the style table
    pub fn cell_style(&self, sheet: usize, row: u32, col: u16) -> Option<&Style> {
        let index = self.worksheet(sheet)?.style_index_at(row, col);
        self.styles.get(index)
    }

    /// Pool a style and assign it to a cell
    pub fn set_cell_style(&mut self, sheet: usize, row: u32, col: u16, style: Style) -> Result<()> {
        let count = self.worksheets.len();
        let index = self.styles.get_or_insert(style);
        self.worksheets
            .get_mut(sheet)
            .ok_or(Error::SheetOutOfBounds(sheet, count))?
            .set_cell_style_index_at(row, col, index)
    }

    /// Epoch used for serial dates
    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    /// Set the epoch used for serial dates
    pub fn set_date_system(&mut self, date_system: DateSystem) {
        self.date_system = date_system;
    }

    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        let name_lower = name.to_lowercase();
        if self
            .worksheets
            .iter()
            .any(|ws| ws.name().to_lowercase() == name_lower)
        {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Style;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.sheet_names(), vec!["Sheet1"]);
        assert_eq!(wb.date_system(), DateSystem::V1900);
    }

    #[test]
    fn test_duplicate_name_is_case_insensitive() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_worksheet_with_name("SHEET1"),
            Err(Error::DuplicateSheetName(_))
        ));
        assert_eq!(wb.add_worksheet_with_name("Data").unwrap(), 1);
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut wb = Workbook::empty();
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("a/b").is_err());
        assert!(wb.add_worksheet_with_name(&"x".repeat(32)).is_err());
        assert!(wb.add_worksheet_with_name(&"가".repeat(31)).is_ok());
    }

    #[test]
    fn test_cell_style_goes_through_pool() {
        let mut wb = Workbook::new();
        wb.set_cell_style(0, 0, 0, Style::new().bold(true)).unwrap();
        wb.set_cell_style(0, 1, 0, Style::new().bold(true)).unwrap();

        assert_eq!(wb.styles().len(), 2);
        assert!(wb.cell_style(0, 1, 0).unwrap().font.bold);
        assert!(wb.set_cell_style(3, 0, 0, Style::new()).is_err());
    }
}
