//! # sheetgate
//!
//! Schema-driven import of Excel (XLSX) uploads.
//!
//! An upload is checked for hostile archives, its columns are matched to the
//! fields of a registered [`Schema`], every data row is coerced and validated,
//! and then either the rows go to the schema's [`PersistenceHandler`] or an
//! error report is written: a copy of the upload with failing cells
//! highlighted and one message column per row.
//!
//! ## Features
//!
//! - Zip bomb, encryption and external entity checks before parsing
//! - Fixed or header-matched column resolution, including merged headers
//! - String, integer, decimal, date, datetime and boolean coercion
//! - Per-field constraints plus unique fields and unique field groups
//! - Streaming error report generation under a bounded row window
//!
//! ## Example
//!
//! ```rust,no_run
//! use sheetgate::prelude::*;
//!
//! # fn main() -> sheetgate::Result<()> {
//! let schema = Schema::builder("products")
//!     .field(FieldDef::new("code", FieldType::String, "Code").not_null().unique())
//!     .field(FieldDef::new("qty", FieldType::Integer, "Quantity").range(Some(0.0), None))
//!     .build()?;
//!
//! let registry = SchemaRegistry::builder()
//!     .register(schema, JsonLinesPersistence::new("products.jsonl"))
//!     .build()?;
//! let importer = Importer::new(registry, ImportOptions::default())?;
//!
//! let context = KeyValueContext::new().with("tenant", "acme");
//! let path = std::path::Path::new("upload.xlsx");
//! let result = importer.run(&ImportRequest::file(path, "products", &context));
//! println!("{}", result.message);
//! # Ok(())
//! # }
//! ```

pub mod coerce;
pub mod collaborators;
pub mod common;
pub mod config;
pub mod error;
pub mod format;
pub mod orchestrator;
pub mod parser;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod result;
pub mod retry;
pub mod schema;
pub mod security;
pub mod validation;

pub use coerce::{Coercer, CoercionError};
pub use collaborators::{
    ExternalUniquenessChecker, JsonLinesPersistence, MemoryStore, PersistOutcome,
    PersistenceHandler,
};
pub use common::{CommonData, KeyValueContext};
pub use config::{ArchiveLimits, ImportOptions};
pub use error::{ImportError, Result};
pub use format::SheetView;
pub use orchestrator::{ImportRequest, ImportState, Importer, Upload};
pub use parser::{ParseOutcome, RowParser};
pub use record::{FieldValue, ParsedRows, Record};
pub use registry::{RegistryBuilder, SchemaEntry, SchemaRegistry};
pub use report::{ErrorReportGenerator, ReportStore, StoredReport};
pub use resolver::{ColumnMapping, ColumnMappings, ColumnResolver, ResolutionError};
pub use result::{CellError, ImportResult, RowError, RowErrorSet, ValidationResult};
pub use retry::{retry_with_policy, Attempt, RetryOutcome, RetryPolicy};
pub use schema::{
    ColumnSpec, Constraints, FieldDef, FieldType, ImportConfig, MatchMode, Schema, SchemaBuilder,
};
pub use security::SecurityGuard;
pub use validation::ValidationEngine;

// Workbook model and XLSX I/O, for callers that build or inspect files
pub use sheetgate_core::{CellValue, Workbook, Worksheet};
pub use sheetgate_xlsx::{XlsxError, XlsxReader, XlsxWriter};
