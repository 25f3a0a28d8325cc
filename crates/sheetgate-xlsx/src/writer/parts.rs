//! Package parts shared by the whole-workbook and streaming writers

use std::collections::BTreeMap;
use std::io::{Seek, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::XlsxResult;
use crate::xml::escape_xml;
use sheetgate_core::{CellAddress, CellData, CellRange, CellValue};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Name and visibility of one sheet, as listed in workbook.xml
#[derive(Debug, Clone)]
pub(crate) struct SheetMeta {
    pub name: String,
    pub visible: bool,
}

/// Column widths and hidden flags written as `<cols>`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    /// Custom column widths in characters
    pub column_widths: BTreeMap<u16, f64>,
    /// Hidden columns
    pub hidden_columns: BTreeMap<u16, bool>,
    /// Whether the sheet tab is visible
    pub visible: bool,
}

impl SheetLayout {
    /// Layout with no custom columns and a visible tab
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Self::default()
        }
    }

    /// Copy the column layout of an existing worksheet
    pub fn from_worksheet(sheet: &sheetgate_core::Worksheet) -> Self {
        Self {
            column_widths: sheet.custom_column_widths().clone(),
            hidden_columns: sheet.hidden_columns().clone(),
            visible: sheet.is_visible(),
        }
    }
}

pub(crate) fn start_part<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str) -> XlsxResult<()> {
    zip.start_file(name, SimpleFileOptions::default())?;
    Ok(())
}

pub(crate) fn write_part<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    content: &str,
) -> XlsxResult<()> {
    start_part(zip, name)?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

/// Write the package parts that depend only on the sheet list and styles
pub(crate) fn write_package<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    sheets: &[SheetMeta],
    date1904: bool,
    styles_xml: &str,
) -> XlsxResult<()> {
    write_part(zip, "[Content_Types].xml", &content_types(sheets.len()))?;
    write_part(zip, "_rels/.rels", ROOT_RELS)?;
    write_part(zip, "xl/workbook.xml", &workbook_xml(sheets, date1904))?;
    write_part(zip, "xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len()))?;
    write_part(zip, "xl/styles.xml", styles_xml)?;
    Ok(())
}

pub(crate) fn sheet_part_name(index: usize) -> String {
    format!("xl/worksheets/sheet{}.xml", index + 1)
}

fn content_types(sheet_count: usize) -> String {
    let mut content = format!(
        r#"{XML_DECL}
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
    );
    for i in 0..sheet_count {
        content.push_str(&format!(
            r#"
    <Override PartName="/{}" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            sheet_part_name(i)
        ));
    }
    content.push_str("\n</Types>");
    content
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

fn workbook_xml(sheets: &[SheetMeta], date1904: bool) -> String {
    let mut content = format!(
        r#"{XML_DECL}
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
    );
    if date1904 {
        content.push_str("\n    <workbookPr date1904=\"1\"/>");
    }
    content.push_str("\n    <sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        let state = if sheet.visible { "" } else { " state=\"hidden\"" };
        content.push_str(&format!(
            "\n        <sheet name=\"{}\" sheetId=\"{}\"{} r:id=\"rId{}\"/>",
            escape_xml(&sheet.name),
            i + 1,
            state,
            i + 1
        ));
    }
    content.push_str("\n    </sheets>\n</workbook>");
    content
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut content = format!(
        r#"{XML_DECL}
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
    );
    for i in 0..sheet_count {
        content.push_str(&format!(
            r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1,
            i + 1
        ));
    }
    // Styles take the id after the last sheet
    content.push_str(&format!(
        r#"
    <Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
        sheet_count + 1
    ));
    content
}

/// Worksheet prologue up to and including the opening `<sheetData>`
pub(crate) fn worksheet_start(layout: &SheetLayout) -> String {
    let mut content = format!(
        r#"{XML_DECL}
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
    );

    let mut cols: Vec<u16> = layout
        .column_widths
        .keys()
        .chain(layout.hidden_columns.keys())
        .copied()
        .collect();
    cols.sort_unstable();
    cols.dedup();

    if !cols.is_empty() {
        content.push_str("\n    <cols>");
        for col in cols {
            let mut attrs = format!(" min=\"{}\" max=\"{}\"", col + 1, col + 1);
            match layout.column_widths.get(&col) {
                Some(width) => attrs.push_str(&format!(" width=\"{}\" customWidth=\"1\"", width)),
                None => attrs.push_str(&format!(
                    " width=\"{}\"",
                    sheetgate_core::worksheet::DEFAULT_COLUMN_WIDTH
                )),
            }
            if layout.hidden_columns.get(&col).copied().unwrap_or(false) {
                attrs.push_str(" hidden=\"1\"");
            }
            content.push_str(&format!("\n        <col{}/>", attrs));
        }
        content.push_str("\n    </cols>");
    }

    content.push_str("\n    <sheetData>");
    content
}

/// One `<row>` element; returns an empty string for a row with nothing to say
pub(crate) fn row_xml<'a, I>(row: u32, height: Option<f64>, hidden: bool, cells: I) -> String
where
    I: IntoIterator<Item = (u16, &'a CellData)>,
{
    let mut body = String::new();
    for (col, cell) in cells {
        push_cell(&mut body, row, col, cell);
    }
    if body.is_empty() && height.is_none() && !hidden {
        return body;
    }

    let mut attrs = format!(" r=\"{}\"", row + 1);
    if let Some(height) = height {
        attrs.push_str(&format!(" ht=\"{}\" customHeight=\"1\"", height));
    }
    if hidden {
        attrs.push_str(" hidden=\"1\"");
    }
    format!("\n        <row{}>{}\n        </row>", attrs, body)
}

fn push_cell(out: &mut String, row: u32, col: u16, cell: &CellData) {
    let cell_ref = CellAddress::new(row, col).to_a1_string();
    let style_attr = if cell.style_index != 0 {
        format!(" s=\"{}\"", cell.style_index)
    } else {
        String::new()
    };

    match &cell.value {
        CellValue::Empty => {
            if cell.style_index != 0 {
                out.push_str(&format!("\n            <c r=\"{}\"{}/>", cell_ref, style_attr));
            }
        }
        CellValue::Formula { text, cached_value } => {
            let formula = text.strip_prefix('=').unwrap_or(text);
            let (kind, cached) = match cached_value.as_deref() {
                Some(value) => value_parts(value),
                None => (None, None),
            };
            out.push_str(&format!(
                "\n            <c r=\"{}\"{}{}><f>{}</f>{}</c>",
                cell_ref,
                style_attr,
                kind.map(|k| format!(" t=\"{}\"", k)).unwrap_or_default(),
                escape_xml(formula),
                cached.map(|v| format!("<v>{}</v>", v)).unwrap_or_default()
            ));
        }
        CellValue::String(s) => {
            out.push_str(&format!(
                "\n            <c r=\"{}\"{} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                cell_ref,
                style_attr,
                escape_xml(s.as_str())
            ));
        }
        value => {
            let (kind, v) = value_parts(value);
            out.push_str(&format!(
                "\n            <c r=\"{}\"{}{}><v>{}</v></c>",
                cell_ref,
                style_attr,
                kind.map(|k| format!(" t=\"{}\"", k)).unwrap_or_default(),
                v.unwrap_or_default()
            ));
        }
    }
}

/// Cell type attribute and escaped `<v>` text for a plain value
fn value_parts(value: &CellValue) -> (Option<&'static str>, Option<String>) {
    match value {
        CellValue::Number(n) => (None, Some(n.to_string())),
        CellValue::Boolean(b) => (Some("b"), Some(u8::from(*b).to_string())),
        CellValue::Error(e) => (Some("e"), Some(escape_xml(e.as_str()))),
        CellValue::String(s) => (Some("str"), Some(escape_xml(s.as_str()))),
        CellValue::Empty | CellValue::Formula { .. } => (None, None),
    }
}

/// Worksheet epilogue after the last row
pub(crate) fn worksheet_end(merges: &[CellRange]) -> String {
    let mut content = String::from("\n    </sheetData>");
    if !merges.is_empty() {
        content.push_str(&format!("\n    <mergeCells count=\"{}\">", merges.len()));
        for range in merges {
            content.push_str(&format!("\n        <mergeCell ref=\"{}\"/>", range));
        }
        content.push_str("\n    </mergeCells>");
    }
    content.push_str("\n</worksheet>");
    content
}
