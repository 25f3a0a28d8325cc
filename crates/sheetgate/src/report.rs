//! Annotated error reports
//!
//! The report is a copy of the uploaded workbook written through the streaming
//! writer: every sheet, style, column width and merged region is carried over,
//! cells with errors get a highlight fill, and the data sheet gains a column
//! holding each row's error messages plus a disclaimer below the data.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::common::CommonData;
use crate::config::ImportOptions;
use crate::error::{ImportError, Result};
use crate::result::{RowError, ValidationResult};
use crate::schema::ImportConfig;
use crate::security::SecurityGuard;
use sheetgate_core::{
    CellRange, CellValue, Color, FillStyle, NumberFormat, Style, StylePool, Workbook, Worksheet,
};
use sheetgate_xlsx::{SheetLayout, StreamRow, StreamingWriter};

/// Width of the appended error column, in characters
const ERROR_COLUMN_WIDTH: f64 = 60.0;

const REPORT_EXTENSION: &str = "xlsx";
const SIDECAR_EXTENSION: &str = "name";

/// Writes annotated copies of a workbook
#[derive(Debug, Clone)]
pub struct ErrorReportGenerator {
    highlight: Color,
    disclaimer: String,
    window: usize,
}

impl ErrorReportGenerator {
    pub fn new(highlight: Color, disclaimer: impl Into<String>, window: usize) -> Self {
        Self {
            highlight,
            disclaimer: disclaimer.into(),
            window,
        }
    }

    /// Generator configured from import options
    pub fn from_options(options: &ImportOptions) -> Result<Self> {
        Ok(Self::new(
            options.highlight()?,
            options.disclaimer.clone(),
            options.report_window,
        ))
    }

    /// Write the report for `source` into `out`
    ///
    /// `config` names the data sheet and its header row; `validation` supplies
    /// the row errors. The source workbook is only read.
    pub fn generate<W: Write + Seek>(
        &self,
        source: &Workbook,
        validation: &ValidationResult,
        config: &ImportConfig,
        out: W,
    ) -> Result<W> {
        let mut writer = StreamingWriter::new(out, self.window);
        writer.set_date_system(source.date_system());

        let errors: HashMap<u32, &RowError> = validation
            .errors
            .iter()
            .map(|e| (e.row_number, e))
            .collect();
        let mut styles = StyleMapper::new(source, self.highlight);

        for (index, sheet) in source.worksheets().enumerate() {
            if index == config.sheet_index {
                self.write_data_sheet(&mut writer, &mut styles, sheet, &errors, config)?;
            } else {
                write_plain_sheet(&mut writer, &mut styles, sheet)?;
            }
        }

        *writer.styles_mut() = styles.into_pool();
        log::debug!(
            "report written: {} sheets, {} annotated rows",
            writer.sheet_count(),
            errors.len()
        );
        Ok(writer.finish()?)
    }

    fn write_data_sheet<W: Write + Seek>(
        &self,
        writer: &mut StreamingWriter<W>,
        styles: &mut StyleMapper<'_>,
        sheet: &Worksheet,
        errors: &HashMap<u32, &RowError>,
        config: &ImportConfig,
    ) -> Result<()> {
        let (last_row, last_col) = content_bounds(sheet);
        let error_col = last_col.map_or(0, |col| col + 1);
        let header_row = config.header_row.saturating_sub(1);
        let disclaimer_row = last_row.map_or(0, |row| row + 2);

        let mut layout = SheetLayout::from_worksheet(sheet);
        layout.column_widths.insert(error_col, ERROR_COLUMN_WIDTH);
        writer.begin_sheet(sheet.name(), &layout)?;

        let mut rows = sheet_rows(sheet);
        rows.insert(header_row);
        rows.insert(disclaimer_row);
        rows.extend(errors.keys().filter(|&&n| n > 0).map(|n| n - 1));

        let header_style = styles.insert(Style::new().bold(true));
        let note_style = styles.insert(Style::new().italic(true));

        for index in rows {
            let mut row = copy_row(sheet, index, styles);

            if index == header_row {
                let header = SecurityGuard::escape_formula(&config.error_column_header);
                row.set(error_col, &*header, header_style);
            }

            if let Some(error) = errors.get(&(index + 1)) {
                for cell in &error.errors {
                    let Some(col) = cell.column_index else {
                        continue;
                    };
                    match row.cell_mut(col) {
                        Some(data) => data.style_index = styles.highlight(data.style_index),
                        None => {
                            let style = styles.highlight(0);
                            row.set(col, CellValue::Empty, style);
                        }
                    }
                }
                let message = error.formatted_message();
                row.set(error_col, &*SecurityGuard::escape_formula(&message), 0);
            }

            if index == disclaimer_row {
                row.set(0, &*SecurityGuard::escape_formula(&self.disclaimer), note_style);
            }

            writer.write_row(row)?;
        }

        let mut merges = sheet.merged_regions().to_vec();
        let note = CellRange::from_indices(disclaimer_row, 0, disclaimer_row, error_col);
        if error_col > 0 && !merges.iter().any(|m| m.overlaps(&note)) {
            merges.push(note);
        }
        writer.end_sheet(&merges)?;
        Ok(())
    }
}

fn write_plain_sheet<W: Write + Seek>(
    writer: &mut StreamingWriter<W>,
    styles: &mut StyleMapper<'_>,
    sheet: &Worksheet,
) -> Result<()> {
    writer.begin_sheet(sheet.name(), &SheetLayout::from_worksheet(sheet))?;
    for index in sheet_rows(sheet) {
        writer.write_row(copy_row(sheet, index, styles))?;
    }
    writer.end_sheet(sheet.merged_regions())?;
    Ok(())
}

/// Last row and column covered by a cell or a merged region
fn content_bounds(sheet: &Worksheet) -> (Option<u32>, Option<u16>) {
    let mut last_row = sheet.last_row();
    let mut last_col = sheet.used_range().map(|range| range.end.col);
    for merge in sheet.merged_regions() {
        last_row = last_row.max(Some(merge.end.row));
        last_col = last_col.max(Some(merge.end.col));
    }
    (last_row, last_col)
}

/// Rows with cells, a custom height or a hidden flag
fn sheet_rows(sheet: &Worksheet) -> BTreeSet<u32> {
    let mut rows: BTreeSet<u32> = sheet.row_indices().collect();
    rows.extend(sheet.custom_row_heights().keys().copied());
    rows.extend(sheet.hidden_rows().keys().copied());
    rows
}

fn copy_row(sheet: &Worksheet, index: u32, styles: &mut StyleMapper<'_>) -> StreamRow {
    let mut row = StreamRow::new(index);
    row.height = sheet.custom_row_heights().get(&index).copied();
    row.hidden = sheet.is_row_hidden(index);
    for (col, data) in sheet.row_cells(index) {
        let style = styles.map(data.style_index);
        row.set(col, data.value.clone(), style);
    }
    row
}

/// Source-to-report style translation with a per-report highlight cache
///
/// Indices it hands out refer to its own pool, which becomes the report's
/// style table.
struct StyleMapper<'a> {
    source: &'a Workbook,
    pool: StylePool,
    mapped: HashMap<u32, u32>,
    highlighted: HashMap<u32, u32>,
    fill: FillStyle,
}

impl<'a> StyleMapper<'a> {
    fn new(source: &'a Workbook, highlight: Color) -> Self {
        Self {
            source,
            pool: StylePool::new(),
            mapped: HashMap::new(),
            highlighted: HashMap::new(),
            fill: FillStyle::solid(highlight),
        }
    }

    fn insert(&mut self, style: Style) -> u32 {
        self.pool.get_or_insert(style)
    }

    fn into_pool(self) -> StylePool {
        self.pool
    }

    /// Report index of a source style
    fn map(&mut self, source_index: u32) -> u32 {
        if let Some(&index) = self.mapped.get(&source_index) {
            return index;
        }
        let src = self.source.styles().get_or_default(source_index);
        let style = Style {
            font: src.font.clone(),
            fill: src.fill.clone(),
            border: src.border.clone(),
            alignment: src.alignment.clone(),
            number_format: NumberFormat::from_string(src.number_format.format_string()),
            protection: src.protection,
        };
        let index = self.pool.get_or_insert(style);
        self.mapped.insert(source_index, index);
        index
    }

    /// Report index of `base` with the highlight fill
    fn highlight(&mut self, base: u32) -> u32 {
        if let Some(&index) = self.highlighted.get(&base) {
            return index;
        }
        let mut style = self.pool.get_or_default(base).clone();
        style.fill = self.fill.clone();
        let index = self.pool.get_or_insert(style);
        self.highlighted.insert(base, index);
        index
    }
}

/// A stored report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReport {
    pub id: String,
    pub path: PathBuf,
}

/// Report files under `<root>/<isolation key>/<id>.xlsx`
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the reports of one caller
    pub fn scope_dir(&self, context: &dyn CommonData) -> PathBuf {
        context
            .isolation_key()
            .iter()
            .fold(self.root.clone(), |dir, segment| {
                dir.join(SecurityGuard::sanitize_path_segment(segment))
            })
    }

    /// Write a new report through `write`
    ///
    /// Output goes to a `.part` file that is renamed once `write` succeeds and
    /// removed when it fails. The original filename, if any, is kept in a
    /// sidecar next to the report.
    pub fn store<F>(
        &self,
        context: &dyn CommonData,
        original_name: Option<&str>,
        write: F,
    ) -> Result<StoredReport>
    where
        F: FnOnce(BufWriter<File>) -> Result<BufWriter<File>>,
    {
        let dir = self.scope_dir(context);
        fs::create_dir_all(&dir)?;

        let id = Uuid::new_v4().to_string();
        let path = dir.join(format!("{}.{}", id, REPORT_EXTENSION));
        let part = dir.join(format!("{}.{}.part", id, REPORT_EXTENSION));

        let written = File::create(&part)
            .map_err(ImportError::from)
            .and_then(|file| write(BufWriter::new(file)))
            .and_then(|out| out.into_inner().map_err(|e| ImportError::Io(e.into_error())))
            .and_then(|file| Ok(file.sync_all()?));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&part) {
                log::warn!("could not remove {}: {}", part.display(), cleanup);
            }
            return Err(e);
        }
        fs::rename(&part, &path)?;

        if let Some(name) = original_name {
            let sidecar = dir.join(format!("{}.{}", id, SIDECAR_EXTENSION));
            fs::write(sidecar, SecurityGuard::sanitize_filename(name))?;
        }

        log::info!("stored error report {}", path.display());
        Ok(StoredReport { id, path })
    }

    /// Path of a stored report
    pub fn locate(&self, context: &dyn CommonData, id: &str) -> Result<PathBuf> {
        let id = Self::parse_id(id)?;
        let path = self
            .scope_dir(context)
            .join(format!("{}.{}", id, REPORT_EXTENSION));
        if path.is_file() {
            Ok(path)
        } else {
            Err(ImportError::ReportNotFound(id))
        }
    }

    /// Sanitized filename of the upload a report was generated for
    pub fn original_name(&self, context: &dyn CommonData, id: &str) -> Result<Option<String>> {
        let id = Self::parse_id(id)?;
        let sidecar = self
            .scope_dir(context)
            .join(format!("{}.{}", id, SIDECAR_EXTENSION));
        match fs::read_to_string(sidecar) {
            Ok(name) => Ok(Some(name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Canonical form of a report id; only UUIDs are accepted
    fn parse_id(id: &str) -> Result<String> {
        Uuid::parse_str(id)
            .map(|uuid| uuid.to_string())
            .map_err(|_| ImportError::ReportNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::KeyValueContext;
    use crate::result::{CellError, RowErrorSet};
    use sheetgate_xlsx::XlsxReader;
    use std::io::Cursor;

    const PINK: Color = Color::argb(0xFF, 0xFF, 0xC7, 0xCE);

    fn source() -> Workbook {
        let mut workbook = Workbook::new();
        let money = workbook
            .styles_mut()
            .get_or_insert(Style::new().number_format("#,##0.00").bold(true));

        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_cell_value_at(0, 0, "Name").unwrap();
        sheet.set_cell_value_at(0, 1, "Amount").unwrap();
        sheet.set_cell_value_at(1, 0, "Ann").unwrap();
        sheet.set_cell_value_at(1, 1, 12.5).unwrap();
        sheet.set_cell_style_index_at(1, 1, money).unwrap();
        sheet.set_cell_value_at(2, 0, "=SUM(A1:A10)").unwrap();
        sheet.set_column_width(0, 24.0);

        workbook.add_worksheet_with_name("Notes").unwrap();
        let notes = workbook.worksheet_mut(1).unwrap();
        notes.set_cell_value_at(0, 0, "keep me").unwrap();
        notes.merge_cells(&CellRange::parse("A1:C1").unwrap()).unwrap();
        workbook
    }

    fn validation() -> ValidationResult {
        let mut errors = RowErrorSet::new();
        let error = |col: u16, letter: &str, message: &str| CellError {
            column_index: Some(col),
            column_letter: letter.into(),
            field: "f".into(),
            header: "F".into(),
            raw_value: String::new(),
            message: message.into(),
        };
        errors.add(2, error(1, "B", "must be at most 10"));
        errors.add(3, error(0, "A", "=SUM is not allowed"));
        errors.add(3, error(1, "B", "is required"));
        ValidationResult::from_errors(2, errors)
    }

    fn generate() -> Workbook {
        let generator = ErrorReportGenerator::new(PINK, "Regenerated for review", 2);
        let out = generator
            .generate(&source(), &validation(), &ImportConfig::default(), Cursor::new(Vec::new()))
            .unwrap();
        XlsxReader::read(Cursor::new(out.into_inner())).unwrap()
    }

    #[test]
    fn test_sheets_and_error_column() {
        let report = generate();
        assert_eq!(report.sheet_names(), vec!["Sheet1", "Notes"]);

        let data = report.worksheet(0).unwrap();
        assert_eq!(data.value_at(0, 2), CellValue::from("Errors"));
        assert_eq!(data.value_at(1, 2), CellValue::from("[B] must be at most 10"));
        assert_eq!(
            data.value_at(2, 2),
            CellValue::from("[A] =SUM is not allowed; [B] is required")
        );
        assert_eq!(data.column_width(0), 24.0);

        let notes = report.worksheet(1).unwrap();
        assert_eq!(notes.used_range().unwrap().end.col, 0);
        assert_eq!(notes.merged_regions().len(), 1);
    }

    #[test]
    fn test_error_cells_are_highlighted() {
        let report = generate();

        let amount = report.cell_style(0, 1, 1).unwrap();
        assert_eq!(amount.fill, FillStyle::solid(PINK));
        assert!(amount.font.bold);
        assert_eq!(amount.number_format.format_string(), "#,##0.00");

        let blank = report.cell_style(0, 2, 1).unwrap();
        assert_eq!(blank.fill, FillStyle::solid(PINK));
        assert_eq!(report.worksheet(0).unwrap().value_at(2, 1), CellValue::Empty);

        let untouched = report.cell_style(0, 1, 0).unwrap();
        assert!(untouched.fill.is_none());
    }

    #[test]
    fn test_formula_like_text_is_quoted() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_value_at(0, 0, "H").unwrap();
        let config = ImportConfig {
            error_column_header: "=SUM(A1:A10)".into(),
            ..ImportConfig::default()
        };

        let generator = ErrorReportGenerator::new(PINK, "-- generated --", 10);
        let clean = ValidationResult::from_errors(0, RowErrorSet::new());
        let out = generator
            .generate(&wb, &clean, &config, Cursor::new(Vec::new()))
            .unwrap();
        let report = XlsxReader::read(Cursor::new(out.into_inner())).unwrap();
        let sheet = report.worksheet(0).unwrap();
        assert_eq!(sheet.value_at(0, 1), CellValue::from("'=SUM(A1:A10)"));
        assert_eq!(sheet.value_at(2, 0), CellValue::from("'-- generated --"));
    }

    #[test]
    fn test_disclaimer_row() {
        let report = generate();
        let data = report.worksheet(0).unwrap();
        assert_eq!(data.value_at(4, 0), CellValue::from("Regenerated for review"));
        assert_eq!(
            data.merged_region_at(4, 2),
            Some(&CellRange::from_indices(4, 0, 4, 2))
        );
    }

    fn report_of(workbook: &Workbook, validation: &ValidationResult) -> Workbook {
        let generator = ErrorReportGenerator::new(PINK, "Regenerated for review", 4);
        let out = generator
            .generate(workbook, validation, &ImportConfig::default(), Cursor::new(Vec::new()))
            .unwrap();
        XlsxReader::read(Cursor::new(out.into_inner())).unwrap()
    }

    #[test]
    fn test_error_column_clears_merged_header() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value_at(0, 0, "Name").unwrap();
        sheet.set_cell_value_at(0, 1, "Contact").unwrap();
        sheet.merge_cells(&CellRange::parse("B1:D1").unwrap()).unwrap();
        sheet.set_cell_value_at(1, 0, "Ann").unwrap();
        sheet.set_cell_value_at(1, 1, "x").unwrap();

        let mut errors = RowErrorSet::new();
        errors.add(
            2,
            CellError {
                column_index: Some(1),
                column_letter: "B".into(),
                field: "contact".into(),
                header: "Contact".into(),
                raw_value: "x".into(),
                message: "is not an email".into(),
            },
        );
        let report = report_of(&wb, &ValidationResult::from_errors(1, errors));
        let data = report.worksheet(0).unwrap();

        assert_eq!(data.value_at(0, 4), CellValue::from("Errors"));
        assert_eq!(data.merged_region_at(0, 4), None);
        assert_eq!(data.value_at(1, 4), CellValue::from("[B] is not an email"));
        assert_eq!(
            data.merged_region_at(0, 3),
            Some(&CellRange::from_indices(0, 1, 0, 3))
        );
    }

    #[test]
    fn test_disclaimer_clears_tall_merge() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value_at(0, 0, "Name").unwrap();
        sheet.set_cell_value_at(1, 0, "Ann").unwrap();
        sheet.merge_cells(&CellRange::parse("A2:A6").unwrap()).unwrap();

        let clean = ValidationResult::from_errors(1, RowErrorSet::new());
        let report = report_of(&wb, &clean);
        let data = report.worksheet(0).unwrap();

        assert_eq!(data.value_at(7, 0), CellValue::from("Regenerated for review"));
        assert_eq!(
            data.merged_region_at(7, 1),
            Some(&CellRange::from_indices(7, 0, 7, 1))
        );
        assert_eq!(data.merged_regions().len(), 2);
    }

    #[test]
    fn test_hidden_flags_survive() {
        let mut wb = source();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_row_hidden(1, true);
        sheet.set_column_hidden(1, true);
        sheet.merge_cells(&CellRange::parse("A3:B3").unwrap()).unwrap();
        wb.worksheet_mut(1).unwrap().set_visible(false);

        let report = report_of(&wb, &validation());
        let data = report.worksheet(0).unwrap();
        assert!(data.is_row_hidden(1));
        assert!(!data.is_row_hidden(2));
        assert!(data.is_column_hidden(1));
        assert!(!data.is_column_hidden(0));
        assert!(data.is_visible());
        assert_eq!(
            data.merged_region_at(2, 1),
            Some(&CellRange::from_indices(2, 0, 2, 1))
        );

        let notes = report.worksheet(1).unwrap();
        assert!(!notes.is_visible());
        assert_eq!(notes.merged_regions().len(), 1);
    }

    #[test]
    fn test_store_and_locate() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let ctx = KeyValueContext::new().with("tenant", "../acme");

        let stored = store
            .store(&ctx, Some("../../q1 upload.xlsx"), |mut out| {
                out.write_all(b"report")?;
                Ok(out)
            })
            .unwrap();

        assert!(stored.path.starts_with(dir.path().join("acme")));
        assert_eq!(store.locate(&ctx, &stored.id).unwrap(), stored.path);
        assert_eq!(
            store.original_name(&ctx, &stored.id).unwrap().as_deref(),
            Some("q1 upload.xlsx")
        );

        assert!(matches!(
            store.locate(&ctx, "../../etc/passwd"),
            Err(ImportError::ReportNotFound(_))
        ));
        let other = KeyValueContext::new().with("tenant", "globex");
        assert!(store.locate(&other, &stored.id).is_err());
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let ctx = KeyValueContext::new().with("tenant", "acme");

        let result = store.store(&ctx, None, |_| Err(ImportError::Persistence("boom".into())));
        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path().join("acme")).unwrap().count(), 0);
    }
}
