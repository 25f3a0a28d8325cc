//! Forward-only XLSX writer with a bounded row window

use std::collections::{BTreeMap, VecDeque};
use std::io::{Seek, Write};

use zip::ZipWriter;

use super::parts::{self, SheetLayout, SheetMeta};
use crate::error::{XlsxError, XlsxResult};
use crate::styles::styles_xml;
use sheetgate_core::{CellData, CellRange, CellValue, DateSystem, StylePool};

/// One row handed to a [`StreamingWriter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRow {
    /// 0-based row index
    pub index: u32,
    /// Custom height in points
    pub height: Option<f64>,
    /// Hidden flag
    pub hidden: bool,
    cells: BTreeMap<u16, CellData>,
}

impl StreamRow {
    /// Create an empty row
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Set a cell, replacing any previous content
    pub fn set_cell(&mut self, col: u16, data: CellData) {
        self.cells.insert(col, data);
    }

    /// Set a cell from a value and style index
    pub fn set<V: Into<CellValue>>(&mut self, col: u16, value: V, style_index: u32) {
        self.set_cell(col, CellData::with_style(value.into(), style_index));
    }

    /// Get a cell
    pub fn cell(&self, col: u16) -> Option<&CellData> {
        self.cells.get(&col)
    }

    /// Get a mutable cell
    pub fn cell_mut(&mut self, col: u16) -> Option<&mut CellData> {
        self.cells.get_mut(&col)
    }

    /// Cells in column order
    pub fn cells(&self) -> impl Iterator<Item = (u16, &CellData)> {
        self.cells.iter().map(|(&col, data)| (col, data))
    }
}

#[derive(Debug, Default)]
struct OpenSheet {
    window: VecDeque<StreamRow>,
    last_row: Option<u32>,
}

/// Streaming XLSX writer
///
/// Sheets are written one after another. Each row passes through a window of at
/// most `window_size` rows; older rows are already compressed into the archive.
/// Styles accumulate in the writer's pool and are written by
/// [`finish`](Self::finish).
pub struct StreamingWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    styles: StylePool,
    date_system: DateSystem,
    sheets: Vec<SheetMeta>,
    open: Option<OpenSheet>,
    window_size: usize,
}

impl<W: Write + Seek> StreamingWriter<W> {
    /// Create a writer keeping at most `window_size` rows in memory
    pub fn new(writer: W, window_size: usize) -> Self {
        Self {
            zip: ZipWriter::new(writer),
            styles: StylePool::new(),
            date_system: DateSystem::default(),
            sheets: Vec::new(),
            open: None,
            window_size: window_size.max(1),
        }
    }

    /// Style pool; indices returned here go into cell style indices
    pub fn styles(&self) -> &StylePool {
        &self.styles
    }

    /// Mutable style pool
    pub fn styles_mut(&mut self) -> &mut StylePool {
        &mut self.styles
    }

    /// Set the date system recorded in workbook.xml
    pub fn set_date_system(&mut self, date_system: DateSystem) {
        self.date_system = date_system;
    }

    /// Number of sheets begun so far
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Start a new sheet
    pub fn begin_sheet(&mut self, name: &str, layout: &SheetLayout) -> XlsxResult<()> {
        if self.open.is_some() {
            return Err(XlsxError::InvalidState("previous sheet is still open"));
        }

        let index = self.sheets.len();
        parts::start_part(&mut self.zip, &parts::sheet_part_name(index))?;
        self.zip.write_all(parts::worksheet_start(layout).as_bytes())?;

        self.sheets.push(SheetMeta {
            name: name.to_string(),
            visible: layout.visible,
        });
        self.open = Some(OpenSheet::default());
        log::debug!("streaming sheet {} '{}'", index, name);
        Ok(())
    }

    /// Append a row; its index must be greater than every row written before
    pub fn write_row(&mut self, row: StreamRow) -> XlsxResult<()> {
        let open = self
            .open
            .as_mut()
            .ok_or(XlsxError::InvalidState("no sheet is open"))?;

        if let Some(last) = open.last_row {
            if row.index <= last {
                return Err(XlsxError::RowOutOfOrder {
                    row: row.index,
                    last,
                });
            }
        }
        open.last_row = Some(row.index);
        open.window.push_back(row);

        while open.window.len() > self.window_size {
            if let Some(oldest) = open.window.pop_front() {
                Self::flush_row(&mut self.zip, &oldest)?;
            }
        }
        Ok(())
    }

    /// Flush the window and close the open sheet
    pub fn end_sheet(&mut self, merges: &[CellRange]) -> XlsxResult<()> {
        let open = self
            .open
            .take()
            .ok_or(XlsxError::InvalidState("no sheet is open"))?;

        for row in &open.window {
            Self::flush_row(&mut self.zip, row)?;
        }
        self.zip.write_all(parts::worksheet_end(merges).as_bytes())?;
        Ok(())
    }

    /// Write the workbook-level parts and close the archive
    pub fn finish(mut self) -> XlsxResult<W> {
        if self.open.is_some() {
            return Err(XlsxError::InvalidState("a sheet is still open"));
        }
        if self.sheets.is_empty() {
            return Err(XlsxError::InvalidState("a workbook needs at least one sheet"));
        }

        parts::write_package(
            &mut self.zip,
            &self.sheets,
            self.date_system == DateSystem::V1904,
            &styles_xml(&self.styles),
        )?;
        log::debug!(
            "finished streaming workbook: {} sheets, {} styles",
            self.sheets.len(),
            self.styles.len()
        );
        Ok(self.zip.finish()?)
    }

    fn flush_row(zip: &mut ZipWriter<W>, row: &StreamRow) -> XlsxResult<()> {
        let xml = parts::row_xml(row.index, row.height, row.hidden, row.cells());
        zip.write_all(xml.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XlsxReader;
    use sheetgate_core::Style;
    use std::io::Cursor;

    fn row(index: u32, text: &str) -> StreamRow {
        let mut row = StreamRow::new(index);
        row.set(0, text, 0);
        row
    }

    #[test]
    fn test_rows_beyond_the_window_are_kept() {
        let mut writer = StreamingWriter::new(Cursor::new(Vec::new()), 2);
        writer.begin_sheet("Data", &SheetLayout::new()).unwrap();
        for i in 0..5 {
            writer.write_row(row(i * 2, &format!("r{}", i))).unwrap();
        }
        writer.end_sheet(&[]).unwrap();

        let bytes = writer.finish().unwrap().into_inner();
        let workbook = XlsxReader::read(Cursor::new(bytes)).unwrap();
        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.value_at(0, 0), CellValue::from("r0"));
        assert_eq!(sheet.value_at(4, 0), CellValue::from("r2"));
        assert_eq!(sheet.value_at(8, 0), CellValue::from("r4"));
        assert_eq!(sheet.last_row(), Some(8));
    }

    #[test]
    fn test_rows_must_move_forward() {
        let mut writer = StreamingWriter::new(Cursor::new(Vec::new()), 8);
        writer.begin_sheet("Data", &SheetLayout::new()).unwrap();
        writer.write_row(row(5, "a")).unwrap();

        let err = writer.write_row(row(5, "b")).unwrap_err();
        assert!(matches!(err, XlsxError::RowOutOfOrder { row: 5, last: 5 }));
        let err = writer.write_row(row(2, "c")).unwrap_err();
        assert!(matches!(err, XlsxError::RowOutOfOrder { row: 2, last: 5 }));
    }

    #[test]
    fn test_state_errors() {
        let mut writer = StreamingWriter::new(Cursor::new(Vec::new()), 8);
        assert!(matches!(
            writer.write_row(row(0, "a")),
            Err(XlsxError::InvalidState(_))
        ));
        writer.begin_sheet("One", &SheetLayout::new()).unwrap();
        assert!(writer.begin_sheet("Two", &SheetLayout::new()).is_err());
    }

    #[test]
    fn test_styles_layout_and_merges_survive() {
        let mut writer = StreamingWriter::new(Cursor::new(Vec::new()), 4);
        let bold = writer.styles_mut().get_or_insert(Style::new().bold(true));

        let mut layout = SheetLayout::new();
        layout.column_widths.insert(1, 30.0);
        layout.hidden_columns.insert(2, true);
        writer.begin_sheet("Styled", &layout).unwrap();

        let mut header = StreamRow::new(0);
        header.set(0, "merged", bold);
        header.height = Some(24.0);
        writer.write_row(header).unwrap();
        writer
            .end_sheet(&[CellRange::from_indices(0, 0, 0, 2)])
            .unwrap();

        writer.begin_sheet("Second", &SheetLayout::new()).unwrap();
        writer.end_sheet(&[]).unwrap();

        let bytes = writer.finish().unwrap().into_inner();
        let workbook = XlsxReader::read(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Styled", "Second"]);

        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.column_width(1), 30.0);
        assert!(sheet.is_column_hidden(2));
        assert_eq!(sheet.row_height(0), 24.0);
        assert_eq!(sheet.merged_regions().len(), 1);
        assert!(workbook.cell_style(0, 0, 0).unwrap().font.bold);
    }
}
