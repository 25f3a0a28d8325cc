//! Import orchestration
//!
//! One upload moves through a fixed sequence of states:
//!
//! ```text
//! Received -> SecurityChecked -> RowCountEstimated -> Parsed -> Validated
//!          -> Persisted | ReportGenerated -> Done
//! ```
//!
//! Any state may fail, which ends the run with a failure [`ImportResult`] and
//! no report. Rows that fail validation are not a failure of the run: they
//! produce an error report instead of being persisted.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use crate::common::CommonData;
use crate::config::ImportOptions;
use crate::error::{ImportError, Result};
use crate::format::SheetView;
use crate::parser::RowParser;
use crate::registry::SchemaRegistry;
use crate::report::{ErrorReportGenerator, ReportStore};
use crate::resolver::ColumnResolver;
use crate::result::ImportResult;
use crate::security::{hardening_error, SecurityGuard};
use crate::validation::ValidationEngine;
use sheetgate_xlsx::count_rows;

/// Progress of one import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Received,
    SecurityChecked,
    RowCountEstimated,
    Parsed,
    Validated,
    Persisted,
    ReportGenerated,
    Done,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportState::Received => "received",
            ImportState::SecurityChecked => "security checked",
            ImportState::RowCountEstimated => "row count estimated",
            ImportState::Parsed => "parsed",
            ImportState::Validated => "validated",
            ImportState::Persisted => "persisted",
            ImportState::ReportGenerated => "report generated",
            ImportState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Where the uploaded workbook is
#[derive(Debug, Clone, Copy)]
pub enum Upload<'a> {
    File(&'a Path),
    Bytes(&'a [u8]),
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

impl<'a> Upload<'a> {
    fn open(&self) -> Result<Box<dyn ReadSeek + 'a>> {
        Ok(match *self {
            Upload::File(path) => Box::new(BufReader::new(File::open(path)?)),
            Upload::Bytes(bytes) => Box::new(Cursor::new(bytes)),
        })
    }
}

/// One upload to import
pub struct ImportRequest<'a> {
    pub upload: Upload<'a>,
    pub schema_id: &'a str,
    /// Caller context passed to collaborators and used to isolate reports
    pub context: &'a dyn CommonData,
    /// Filename the caller uploaded, kept next to the report
    pub original_name: Option<&'a str>,
}

impl<'a> ImportRequest<'a> {
    /// Request for a workbook file
    pub fn file(path: &'a Path, schema_id: &'a str, context: &'a dyn CommonData) -> Self {
        Self {
            upload: Upload::File(path),
            schema_id,
            context,
            original_name: None,
        }
    }

    /// Request for a workbook held in memory
    pub fn bytes(bytes: &'a [u8], schema_id: &'a str, context: &'a dyn CommonData) -> Self {
        Self {
            upload: Upload::Bytes(bytes),
            schema_id,
            context,
            original_name: None,
        }
    }

    pub fn original_name(mut self, name: &'a str) -> Self {
        self.original_name = Some(name);
        self
    }
}

/// Runs uploads through the import pipeline
pub struct Importer {
    registry: SchemaRegistry,
    options: ImportOptions,
    guard: SecurityGuard,
    generator: ErrorReportGenerator,
    reports: ReportStore,
}

impl Importer {
    pub fn new(registry: SchemaRegistry, options: ImportOptions) -> Result<Self> {
        let guard = SecurityGuard::new(options.max_file_bytes, options.read_limits());
        let generator = ErrorReportGenerator::from_options(&options)?;
        let reports = ReportStore::new(options.report_dir.clone());
        Ok(Self {
            registry,
            options,
            guard,
            generator,
            reports,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Where generated reports are kept
    pub fn reports(&self) -> &ReportStore {
        &self.reports
    }

    /// Import one upload
    ///
    /// Fatal problems are reported in the returned result's message rather than
    /// as an error.
    pub fn run(&self, request: &ImportRequest<'_>) -> ImportResult {
        let mut run = Run {
            state: ImportState::Received,
        };
        let result = match self.execute(request, &mut run) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("import failed after state '{}': {}", run.state, e);
                ImportResult::failure(e.to_string())
            }
        };
        run.advance(ImportState::Done);
        log::info!(
            "import of '{}' finished: success={} rows={} error_rows={}",
            request.schema_id,
            result.success,
            result.rows_processed,
            result.error_rows
        );
        result
    }

    fn execute(&self, request: &ImportRequest<'_>, run: &mut Run) -> Result<ImportResult> {
        let entry = self.registry.get(request.schema_id)?;
        let schema = &entry.schema;
        let config = &schema.config;

        let sheets = match request.upload {
            Upload::File(path) => self.guard.check_file(path)?,
            Upload::Bytes(bytes) => self.guard.check_bytes(bytes)?,
        };
        if config.sheet_index >= sheets.len() {
            return Err(ImportError::SheetNotFound(config.sheet_index));
        }
        run.advance(ImportState::SecurityChecked);

        let header_rows = u64::from(config.data_start_row.saturating_sub(1));
        let threshold = self.options.max_rows as u64 + header_rows + self.options.row_count_buffer;
        let counted = count_rows(
            request.upload.open()?,
            config.sheet_index,
            self.guard.limits(),
            Some(threshold),
        )
        .map_err(hardening_error)?;
        if counted > threshold {
            return Err(ImportError::TooManyRows {
                count: counted.saturating_sub(header_rows),
                max: self.options.max_rows as u64,
                estimated: true,
            });
        }
        run.advance(ImportState::RowCountEstimated);

        let workbook = self.guard.read_workbook(request.upload.open()?)?;
        let view = SheetView::of(&workbook, config.sheet_index)
            .ok_or(ImportError::SheetNotFound(config.sheet_index))?;
        let mappings = ColumnResolver::resolve(schema, &view, config.header_row.saturating_sub(1))?;
        let parsed = RowParser::new(schema, &mappings, self.options.max_rows).parse(&view);
        if parsed.exceeds(self.options.max_rows) {
            return Err(ImportError::TooManyRows {
                count: parsed.rows.len() as u64,
                max: self.options.max_rows as u64,
                estimated: false,
            });
        }
        run.advance(ImportState::Parsed);

        let engine = ValidationEngine::new(schema, &mappings)?;
        let mut validation = engine.validate(&parsed.rows, parsed.errors);
        if let Some(checker) = &entry.checker {
            let external = checker.check(&parsed.rows, &mappings, request.context)?;
            if !external.is_empty() {
                log::debug!("external check flagged {} rows", external.len());
                validation = validation.merge(external);
            }
        }
        run.advance(ImportState::Validated);

        if validation.valid {
            let outcome = entry.persistence.persist(&parsed.rows, request.context)?;
            run.advance(ImportState::Persisted);
            return Ok(ImportResult::success(
                parsed.rows.len(),
                outcome.created,
                outcome.updated,
            ));
        }

        let stored = self.reports.store(request.context, request.original_name, |out| {
            self.generator.generate(&workbook, &validation, config, out)
        })?;
        run.advance(ImportState::ReportGenerated);
        Ok(ImportResult::invalid(&validation, stored.id))
    }

    /// Streaming row count of one sheet, for callers that only need the size
    pub fn count_rows(&self, path: &Path, sheet_index: usize) -> Result<u64> {
        self.guard.check_file(path)?;
        let file = BufReader::new(File::open(path)?);
        count_rows(file, sheet_index, self.guard.limits(), None).map_err(hardening_error)
    }
}

struct Run {
    state: ImportState,
}

impl Run {
    fn advance(&mut self, next: ImportState) {
        log::debug!("import state: {} -> {}", self.state, next);
        self.state = next;
    }
}
