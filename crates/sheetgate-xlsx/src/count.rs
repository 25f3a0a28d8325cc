//! Cheap row estimate for one sheet
//!
//! Only workbook.xml, its relationships and the target worksheet are inflated.
//! Cells are never materialized; the count is the number of `<row>` elements.

use std::io::{Read, Seek};

use quick_xml::events::Event;

use crate::error::{XlsxError, XlsxResult};
use crate::limits::ReadLimits;
use crate::package;
use crate::xml::part_reader;

/// Count the `<row>` elements of the sheet at `sheet_index`
///
/// With `stop_after = Some(n)` counting stops as soon as the count exceeds `n`,
/// so the result is `n + 1` for any sheet larger than `n`.
pub fn count_rows<R: Read + Seek>(
    reader: R,
    sheet_index: usize,
    limits: &ReadLimits,
    stop_after: Option<u64>,
) -> XlsxResult<u64> {
    let mut archive = package::open_archive(reader, limits)?;
    let info = package::read_workbook_info(&mut archive, limits)?;
    let entry = info
        .sheets
        .get(sheet_index)
        .ok_or(XlsxError::SheetNotFound(sheet_index))?;

    let part = package::open_part(&mut archive, &entry.path, limits)?
        .ok_or_else(|| XlsxError::MissingPart(entry.path.clone()))?;
    let mut xml = part_reader(part, true);
    let mut buf = Vec::new();
    let mut count: u64 = 0;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::DocType(_)) => return Err(XlsxError::ForbiddenXml(entry.path.clone())),
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"row" => {
                count += 1;
                if stop_after.map_or(false, |max| count > max) {
                    log::debug!("row count for '{}' stopped early at {}", entry.name, count);
                    return Ok(count);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    log::debug!("sheet '{}' has {} rows", entry.name, count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XlsxWriter;
    use sheetgate_core::Workbook;
    use std::io::Cursor;

    fn workbook_with_rows(rows: u32) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        for row in 0..rows {
            sheet.set_cell_value_at(row, 0, row as f64).unwrap();
        }
        XlsxWriter::write(&workbook, Cursor::new(Vec::new()))
            .unwrap()
            .into_inner()
    }

    #[test]
    fn test_count_all_rows() {
        let bytes = workbook_with_rows(25);
        let count = count_rows(Cursor::new(bytes), 0, &ReadLimits::default(), None).unwrap();
        assert_eq!(count, 25);
    }

    #[test]
    fn test_count_stops_early() {
        let bytes = workbook_with_rows(100);
        let count = count_rows(Cursor::new(bytes), 0, &ReadLimits::default(), Some(10)).unwrap();
        assert_eq!(count, 11);
    }

    #[test]
    fn test_missing_sheet() {
        let bytes = workbook_with_rows(1);
        let err = count_rows(Cursor::new(bytes), 3, &ReadLimits::default(), None).unwrap_err();
        assert!(matches!(err, XlsxError::SheetNotFound(3)));
    }
}
