//! XLSX reader
//!
//! Every part is streamed through quick-xml with DOCTYPE declarations rejected,
//! and every inflated byte is counted against the configured [`ReadLimits`].

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};

use crate::error::{XlsxError, XlsxResult};
use crate::limits::ReadLimits;
use crate::package::{self, SheetEntry};
use crate::styles::read_styles_xml;
use crate::xml::{attr_bool, attr_parse, attr_string, decode_excel_escapes, part_reader};
use sheetgate_core::{
    CellAddress, CellData, CellRange, CellValue, DateSystem, ErrorValue, SharedString, Workbook,
    Worksheet, MAX_COLS,
};

const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path with default limits
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a workbook with default limits
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        Self::read_with_limits(reader, &ReadLimits::default())
    }

    /// Read a workbook, enforcing `limits` on the archive
    pub fn read_with_limits<R: Read + Seek>(
        reader: R,
        limits: &ReadLimits,
    ) -> XlsxResult<Workbook> {
        let mut archive = package::open_archive(reader, limits)?;
        let info = package::read_workbook_info(&mut archive, limits)?;

        let shared_strings = match package::open_part(&mut archive, SHARED_STRINGS_PART, limits)? {
            Some(reader) => read_shared_strings(reader)?,
            None => Vec::new(),
        };

        let mut workbook = Workbook::empty();
        if info.date1904 {
            workbook.set_date_system(DateSystem::V1904);
        }

        // cellXfs index -> workbook pool index
        let xf_map: Vec<u32> = match package::open_part(&mut archive, STYLES_PART, limits)? {
            Some(reader) => read_styles_xml(reader)?
                .into_iter()
                .map(|style| workbook.styles_mut().get_or_insert(style))
                .collect(),
            None => vec![0],
        };

        for entry in &info.sheets {
            let mut sheet = Worksheet::new(entry.name.as_str());
            sheet.set_visible(entry.visible);

            match package::open_part(&mut archive, &entry.path, limits)? {
                Some(reader) => {
                    let mut parser = SheetParser::new(&mut sheet, &shared_strings, &xf_map);
                    parser.parse(reader, &entry.path)?;
                }
                None => log::warn!("worksheet part '{}' is missing; sheet left empty", entry.path),
            }

            log::debug!(
                "read sheet '{}': {} cells, {} merged regions",
                sheet.name(),
                sheet.cell_count(),
                sheet.merged_regions().len()
            );
            workbook.add_existing_worksheet(sheet)?;
        }

        if workbook.is_empty() {
            return Err(XlsxError::InvalidFormat("workbook lists no sheets".into()));
        }
        Ok(workbook)
    }

    /// List the sheets of a workbook without reading any cells
    pub fn sheet_entries<R: Read + Seek>(
        reader: R,
        limits: &ReadLimits,
    ) -> XlsxResult<Vec<SheetEntry>> {
        let mut archive = package::open_archive(reader, limits)?;
        Ok(package::read_workbook_info(&mut archive, limits)?.sheets)
    }
}

/// Read the shared string table; rich-text runs are concatenated, phonetic runs dropped
fn read_shared_strings<B: BufRead>(reader: B) -> XlsxResult<Vec<SharedString>> {
    let mut xml = part_reader(reader, false);
    let mut buf = Vec::new();
    let mut strings = Vec::new();

    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::DocType(_)) => {
                return Err(XlsxError::ForbiddenXml(SHARED_STRINGS_PART.into()))
            }
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => strings.push(SharedString::new("")),
            Ok(Event::Text(e)) if in_t => current.push_str(&e.unescape()?),
            Ok(Event::CData(e)) if in_t => current.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    in_si = false;
                    strings.push(SharedString::new(decode_excel_escapes(&current)));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    log::debug!("read {} shared strings", strings.len());
    Ok(strings)
}

/// Which text-bearing child of `<c>` is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellText {
    None,
    Value,
    Formula,
    Inline,
}

/// Attributes and children of the `<c>` being read
#[derive(Debug, Default)]
struct PendingCell {
    row: u32,
    col: u16,
    kind: Option<String>,
    style: u32,
    value: Option<String>,
    formula: Option<String>,
    inline: Option<String>,
}

struct SheetParser<'a> {
    sheet: &'a mut Worksheet,
    shared_strings: &'a [SharedString],
    xf_map: &'a [u32],
    row: u32,
    next_col: u16,
    cell: Option<PendingCell>,
    text: CellText,
    in_phonetic: bool,
}

impl<'a> SheetParser<'a> {
    fn new(sheet: &'a mut Worksheet, shared_strings: &'a [SharedString], xf_map: &'a [u32]) -> Self {
        Self {
            sheet,
            shared_strings,
            xf_map,
            row: 0,
            next_col: 0,
            cell: None,
            text: CellText::None,
            in_phonetic: false,
        }
    }

    fn parse<B: BufRead>(&mut self, reader: B, part: &str) -> XlsxResult<()> {
        let mut xml = part_reader(reader, false);
        let mut buf = Vec::new();
        let mut first_row = true;

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::DocType(_)) => return Err(XlsxError::ForbiddenXml(part.to_string())),
                Ok(Event::Start(e)) => self.start(&e, &mut first_row)?,
                Ok(Event::Empty(e)) => {
                    self.start(&e, &mut first_row)?;
                    self.end(e.name().as_ref())?;
                }
                Ok(Event::Text(e)) if self.text != CellText::None => {
                    let text = e.unescape()?;
                    self.push_text(&text);
                }
                Ok(Event::CData(e)) if self.text != CellText::None => {
                    self.push_text(&String::from_utf8_lossy(&e));
                }
                Ok(Event::End(e)) => self.end(e.name().as_ref())?,
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn start(&mut self, e: &BytesStart<'_>, first_row: &mut bool) -> XlsxResult<()> {
        match e.name().as_ref() {
            b"col" => self.read_col(e),
            b"row" => {
                self.row = match attr_parse::<u32>(e, b"r") {
                    Some(r) if r > 0 => r - 1,
                    _ if *first_row => 0,
                    _ => self.row + 1,
                };
                *first_row = false;
                self.next_col = 0;

                if attr_bool(e, b"customHeight") {
                    if let Some(height) = attr_parse::<f64>(e, b"ht") {
                        self.sheet.set_row_height(self.row, height);
                    }
                }
                if attr_bool(e, b"hidden") {
                    self.sheet.set_row_hidden(self.row, true);
                }
            }
            b"c" => {
                let (row, col) = match attr_string(e, b"r").map(|r| CellAddress::parse(&r)) {
                    Some(Ok(addr)) => (addr.row, addr.col),
                    Some(Err(err)) => return Err(XlsxError::Parse(err.to_string())),
                    None => (self.row, self.next_col),
                };
                self.next_col = col.saturating_add(1);

                let xf = attr_parse::<usize>(e, b"s").unwrap_or(0);
                let style = match self.xf_map.get(xf) {
                    Some(&index) => index,
                    None => {
                        log::warn!("cell references unknown style {}; using default", xf);
                        0
                    }
                };

                self.cell = Some(PendingCell {
                    row,
                    col,
                    kind: attr_string(e, b"t"),
                    style,
                    ..PendingCell::default()
                });
            }
            b"v" if self.cell.is_some() => self.text = CellText::Value,
            b"f" if self.cell.is_some() => {
                self.text = CellText::Formula;
                if let Some(cell) = self.cell.as_mut() {
                    cell.formula.get_or_insert_with(String::new);
                }
            }
            b"rPh" => self.in_phonetic = true,
            b"t" if self.cell.is_some() && !self.in_phonetic => {
                self.text = CellText::Inline;
                if let Some(cell) = self.cell.as_mut() {
                    cell.inline.get_or_insert_with(String::new);
                }
            }
            b"mergeCell" => {
                if let Some(reference) = attr_string(e, b"ref") {
                    let range =
                        CellRange::parse(&reference).map_err(|e| XlsxError::Parse(e.to_string()))?;
                    if let Err(err) = self.sheet.merge_cells(&range) {
                        log::warn!("skipping merged region {}: {}", reference, err);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        match name {
            b"v" | b"f" | b"t" => self.text = CellText::None,
            b"rPh" => self.in_phonetic = false,
            b"c" => {
                if let Some(cell) = self.cell.take() {
                    let (row, col, style) = (cell.row, cell.col, cell.style);
                    let value = self.cell_value(cell);
                    self.sheet
                        .set_cell_at(row, col, CellData::with_style(value, style))?;
                }
                self.text = CellText::None;
            }
            _ => {}
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        let target = match self.text {
            CellText::Value => cell.value.get_or_insert_with(String::new),
            CellText::Formula => cell.formula.get_or_insert_with(String::new),
            CellText::Inline => cell.inline.get_or_insert_with(String::new),
            CellText::None => return,
        };
        target.push_str(text);
    }

    fn read_col(&mut self, e: &BytesStart<'_>) {
        let (Some(min), Some(max)) = (attr_parse::<u32>(e, b"min"), attr_parse::<u32>(e, b"max"))
        else {
            return;
        };
        let width = attr_parse::<f64>(e, b"width").filter(|_| attr_bool(e, b"customWidth"));
        let hidden = attr_bool(e, b"hidden");
        if width.is_none() && !hidden {
            return;
        }

        let last = max.min(MAX_COLS as u32);
        for col in min.max(1)..=last {
            let col = (col - 1) as u16;
            if let Some(width) = width {
                self.sheet.set_column_width(col, width);
            }
            if hidden {
                self.sheet.set_column_hidden(col, true);
            }
        }
    }

    fn cell_value(&self, cell: PendingCell) -> CellValue {
        let raw = cell.value.unwrap_or_default();
        let value = match cell.kind.as_deref() {
            Some("s") => match raw.trim().parse::<usize>().ok().and_then(|i| self.shared_strings.get(i)) {
                Some(s) => CellValue::String(s.clone()),
                None => {
                    log::warn!("shared string index '{}' out of range", raw);
                    CellValue::Empty
                }
            },
            Some("b") => CellValue::Boolean(raw.trim() == "1" || raw.trim() == "true"),
            Some("e") => match ErrorValue::parse(&raw) {
                Some(err) => CellValue::Error(err),
                None => CellValue::string(raw),
            },
            Some("inlineStr") => match cell.inline {
                Some(text) => CellValue::string(decode_excel_escapes(&text)),
                None => CellValue::Empty,
            },
            Some("str") | Some("d") => CellValue::string(decode_excel_escapes(&raw)),
            _ if raw.is_empty() => CellValue::Empty,
            _ => match raw.trim().parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::string(raw),
            },
        };

        match cell.formula.filter(|f| !f.is_empty()) {
            Some(formula) => CellValue::Formula {
                text: format!("={}", formula),
                cached_value: (!value.is_empty()).then(|| Box::new(value)),
            },
            None => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::XlsxWriter;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    /// Build a minimal package from raw parts
    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = SimpleFileOptions::default();
            for (name, content) in parts {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    const WORKBOOK: &str = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <workbookPr date1904="1"/>
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Notes" sheetId="2" state="hidden" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const RELS: &str = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/first.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/second.xml"/>
</Relationships>"#;

    const SHARED: &str = r#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <si><t>Name</t></si>
  <si><r><t>Rich </t></r><r><t>text</t></r><rPh><t>ignored</t></rPh></si>
  <si><t>a_x000D_b</t></si>
</sst>"#;

    const SHEET: &str = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <cols><col min="2" max="3" width="22.5" customWidth="1"/><col min="4" max="4" width="9" hidden="1"/></cols>
  <sheetData>
    <row r="1" ht="30" customHeight="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
    <row r="3" hidden="1">
      <c r="A3"><v>42.5</v></c>
      <c r="B3" t="b"><v>1</v></c>
      <c r="C3" t="e"><v>#DIV/0!</v></c>
      <c r="D3" t="inlineStr"><is><t>inline</t></is></c>
      <c r="E3"><f>A3*2</f><v>85</v></c>
      <c r="F3" t="str"><f>"x"&amp;"y"</f><v>xy</v></c>
      <c r="G3" t="s"><v>2</v></c>
    </row>
  </sheetData>
  <mergeCells count="1"><mergeCell ref="A5:C6"/></mergeCells>
</worksheet>"#;

    fn fixture() -> Vec<u8> {
        package(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/first.xml", SHEET),
            ("xl/worksheets/second.xml", "<worksheet><sheetData/></worksheet>"),
        ])
    }

    #[test]
    fn test_read_cell_kinds() {
        let workbook = XlsxReader::read(Cursor::new(fixture())).unwrap();
        let sheet = workbook.worksheet(0).unwrap();

        assert_eq!(sheet.value_at(0, 0), CellValue::from("Name"));
        assert_eq!(sheet.value_at(0, 1), CellValue::from("Rich text"));
        assert_eq!(sheet.value_at(2, 0), CellValue::Number(42.5));
        assert_eq!(sheet.value_at(2, 1), CellValue::Boolean(true));
        assert_eq!(sheet.value_at(2, 2), CellValue::Error(ErrorValue::Div0));
        assert_eq!(sheet.value_at(2, 3), CellValue::from("inline"));
        assert_eq!(
            sheet.value_at(2, 4),
            CellValue::Formula {
                text: "=A3*2".into(),
                cached_value: Some(Box::new(CellValue::Number(85.0))),
            }
        );
        assert_eq!(sheet.value_at(2, 5).as_string(), Some("xy"));
        assert_eq!(sheet.value_at(2, 6), CellValue::from("a\rb"));
    }

    #[test]
    fn test_read_layout_and_workbook_flags() {
        let workbook = XlsxReader::read(Cursor::new(fixture())).unwrap();
        assert_eq!(workbook.date_system(), DateSystem::V1904);
        assert_eq!(workbook.sheet_names(), vec!["Data", "Notes"]);
        assert!(!workbook.worksheet(1).unwrap().is_visible());

        let sheet = workbook.worksheet(0).unwrap();
        assert_eq!(sheet.row_height(0), 30.0);
        assert!(sheet.is_row_hidden(2));
        assert_eq!(sheet.column_width(1), 22.5);
        assert_eq!(sheet.column_width(2), 22.5);
        assert!(sheet.is_column_hidden(3));
        assert_eq!(sheet.merged_regions(), &[CellRange::parse("A5:C6").unwrap()]);
    }

    #[test]
    fn test_doctype_in_sheet_is_rejected() {
        let evil = r#"<?xml version="1.0"?>
<!DOCTYPE lolz [<!ENTITY lol "lol"><!ENTITY lol2 "&lol;&lol;&lol;">]>
<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>&lol2;</t></is></c></row></sheetData></worksheet>"#;
        let bytes = package(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/worksheets/first.xml", evil),
        ]);
        let err = XlsxReader::read(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, XlsxError::ForbiddenXml(part) if part == "xl/worksheets/first.xml"));
    }

    #[test]
    fn test_missing_workbook_part() {
        let bytes = package(&[("docProps/app.xml", "<Properties/>")]);
        let err = XlsxReader::read(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, XlsxError::MissingPart(_)));
    }

    #[test]
    fn test_sheet_entries() {
        let entries = XlsxReader::sheet_entries(Cursor::new(fixture()), &ReadLimits::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "xl/worksheets/first.xml");
        assert_eq!(entries[1].path, "xl/worksheets/second.xml");
        assert!(!entries[1].visible);
    }

    #[test]
    fn test_writer_roundtrip() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", "héllo & <world>").unwrap();
        sheet.set_cell_value("B2", 3.25).unwrap();
        sheet.set_cell_value("C3", true).unwrap();
        sheet.set_row_height(1, 40.0);
        sheet.merge_cells(&CellRange::parse("D1:E2").unwrap()).unwrap();

        let bytes = XlsxWriter::write(&workbook, Cursor::new(Vec::new()))
            .unwrap()
            .into_inner();
        let read = XlsxReader::read(Cursor::new(bytes)).unwrap();
        let sheet = read.worksheet(0).unwrap();

        assert_eq!(sheet.value_at(0, 0), CellValue::from("héllo & <world>"));
        assert_eq!(sheet.value_at(1, 1), CellValue::Number(3.25));
        assert_eq!(sheet.value_at(2, 2), CellValue::Boolean(true));
        assert_eq!(sheet.row_height(1), 40.0);
        assert_eq!(sheet.merged_regions().len(), 1);
    }
}
