//! Cell text and date patterns
//!
//! Everything that turns a stored cell into the text a user saw lives here:
//! date-formatted serials become ISO dates, numbers lose float noise, merged
//! cells read through to their master cell.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use sheetgate_core::{CellAddress, CellValue, DateSystem, StylePool, Workbook, Worksheet};

/// Significant digits kept when a number is shown as text
const DISPLAY_DIGITS: usize = 15;

const DEFAULT_DATE_PATTERNS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d"];

const DEFAULT_DATETIME_PATTERNS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Read access to one worksheet with the workbook context needed to interpret it
#[derive(Debug, Clone, Copy)]
pub struct SheetView<'a> {
    sheet: &'a Worksheet,
    styles: &'a StylePool,
    date_system: DateSystem,
}

impl<'a> SheetView<'a> {
    pub fn new(sheet: &'a Worksheet, styles: &'a StylePool, date_system: DateSystem) -> Self {
        Self {
            sheet,
            styles,
            date_system,
        }
    }

    /// View of a workbook sheet by index
    pub fn of(workbook: &'a Workbook, index: usize) -> Option<Self> {
        let sheet = workbook.worksheet(index)?;
        Some(Self::new(sheet, workbook.styles(), workbook.date_system()))
    }

    pub fn sheet(&self) -> &'a Worksheet {
        self.sheet
    }

    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    /// Value and style index of a cell
    ///
    /// An empty cell inside a merged region reads as the region's top-left cell.
    pub fn cell(&self, row: u32, col: u16) -> (CellValue, u32) {
        let value = self.sheet.value_at(row, col);
        let source = match self.sheet.merged_region_at(row, col) {
            Some(region) if value.is_empty() => region.top_left(),
            _ => CellAddress::new(row, col),
        };
        if source.row == row && source.col == col {
            return (value, self.sheet.style_index_at(row, col));
        }
        (
            self.sheet.value_at(source.row, source.col),
            self.sheet.style_index_at(source.row, source.col),
        )
    }

    /// Whether a style shows numbers as dates
    pub fn is_date_style(&self, style_index: u32) -> bool {
        self.styles
            .get_or_default(style_index)
            .number_format
            .is_date_format()
    }

    /// Displayed text of a cell, merged regions resolved
    pub fn text(&self, row: u32, col: u16) -> String {
        let (value, style) = self.cell(row, col);
        cell_text(&value, self.is_date_style(style), self.date_system)
    }
}

/// Text of a cell value as a user would read it
///
/// Date-formatted numbers render as `yyyy-mm-dd` (with the time when it is not
/// midnight); other numbers are rounded to 15 significant digits.
pub fn cell_text(value: &CellValue, is_date: bool, date_system: DateSystem) -> String {
    match value.effective_value() {
        CellValue::Empty => String::new(),
        CellValue::String(s) => s.as_str().to_string(),
        CellValue::Boolean(true) => "TRUE".to_string(),
        CellValue::Boolean(false) => "FALSE".to_string(),
        CellValue::Error(e) => e.as_str().to_string(),
        CellValue::Number(n) if is_date => match date_system.serial_to_datetime(*n) {
            Some(dt) if dt.time() == NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) if dt.nanosecond() == 0 => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            None => number_text(*n),
        },
        CellValue::Number(n) => number_text(*n),
        CellValue::Formula { text, .. } => text.clone(),
    }
}

/// Shortest text of a number after rounding away float noise
pub fn number_text(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded: f64 = format!("{:.*e}", DISPLAY_DIGITS - 1, n)
        .parse()
        .unwrap_or(n);
    rounded.to_string()
}

/// Translate a `yyyy-MM-dd HH:mm:ss` style pattern to a chrono format string
///
/// Text in single quotes is literal; `''` is a quote.
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            i += 1;
            if chars.get(i) == Some(&'\'') {
                out.push('\'');
                i += 1;
                continue;
            }
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1 | 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('H', _) => "%H",
            ('h', _) => "%I",
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                i += run;
                continue;
            }
        };
        out.push_str(spec);
        i += run;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Parse a date with an optional pattern, or the common ISO and European forms
pub fn parse_date(text: &str, pattern: Option<&str>) -> Option<NaiveDate> {
    let text = text.trim();
    match pattern {
        Some(pattern) => {
            let format = translate_pattern(pattern);
            NaiveDate::parse_from_str(text, &format)
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(text, &format).ok().map(|dt| dt.date()))
        }
        None => DEFAULT_DATE_PATTERNS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(text, f).ok()),
    }
}

/// Parse a date and time; a bare date reads as midnight
pub fn parse_datetime(text: &str, pattern: Option<&str>) -> Option<NaiveDateTime> {
    let text = text.trim();
    let parsed = match pattern {
        Some(pattern) => NaiveDateTime::parse_from_str(text, &translate_pattern(pattern)).ok(),
        None => DEFAULT_DATETIME_PATTERNS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok()),
    };
    parsed.or_else(|| parse_date(text, pattern).map(|d| d.and_time(NaiveTime::MIN)))
}
