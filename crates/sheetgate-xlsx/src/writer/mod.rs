//! XLSX writers
//!
//! [`XlsxWriter`] serializes a complete in-memory [`Workbook`]. [`StreamingWriter`]
//! emits rows forward-only through a bounded window, for outputs built while a
//! source workbook is being walked.

mod parts;
mod streaming;

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::error::XlsxResult;
use crate::styles::styles_xml;
use sheetgate_core::{DateSystem, Workbook, Worksheet};

pub use parts::SheetLayout;
pub use streaming::{StreamRow, StreamingWriter};

use parts::SheetMeta;

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write(workbook, BufWriter::new(file))?;
        Ok(())
    }

    /// Write a workbook to a writer, returning the writer
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<W> {
        let mut zip = zip::ZipWriter::new(writer);

        let sheets: Vec<SheetMeta> = workbook
            .worksheets()
            .map(|sheet| SheetMeta {
                name: sheet.name().to_string(),
                visible: sheet.is_visible(),
            })
            .collect();

        parts::write_package(
            &mut zip,
            &sheets,
            workbook.date_system() == DateSystem::V1904,
            &styles_xml(workbook.styles()),
        )?;

        for (i, sheet) in workbook.worksheets().enumerate() {
            parts::write_part(&mut zip, &parts::sheet_part_name(i), &Self::worksheet_xml(sheet))?;
        }

        log::debug!("wrote workbook with {} sheets", sheets.len());
        Ok(zip.finish()?)
    }

    fn worksheet_xml(sheet: &Worksheet) -> String {
        let mut content = parts::worksheet_start(&SheetLayout::from_worksheet(sheet));

        // Rows with layout but no cells still need a <row> element.
        let rows: BTreeSet<u32> = sheet
            .row_indices()
            .chain(sheet.custom_row_heights().keys().copied())
            .chain(sheet.hidden_rows().keys().copied())
            .collect();

        for row in rows {
            content.push_str(&parts::row_xml(
                row,
                sheet.custom_row_heights().get(&row).copied(),
                sheet.is_row_hidden(row),
                sheet.row_cells(row),
            ));
        }

        content.push_str(&parts::worksheet_end(sheet.merged_regions()));
        content
    }
}
