//! Error types for the import pipeline

use thiserror::Error;

use crate::resolver::ResolutionError;

/// Result type alias using [`ImportError`]
pub type Result<T> = std::result::Result<T, ImportError>;

/// Fatal import failures
///
/// Recoverable problems (coercion and validation errors) never surface here; they
/// are collected into a [`ValidationResult`](crate::ValidationResult) instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The upload failed a security check
    #[error("File rejected: {0}")]
    Security(String),

    /// The workbook could not be read or written
    #[error(transparent)]
    Xlsx(#[from] sheetgate_xlsx::XlsxError),

    /// Workbook model error
    #[error(transparent)]
    Core(#[from] sheetgate_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// One or more declared columns could not be located in the header row
    #[error("Column resolution failed: {}", join_resolution_errors(.0))]
    ColumnResolution(Vec<ResolutionError>),

    /// The sheet holds more rows than allowed
    #[error(
        "File has {count}{} data rows; at most {max} are allowed",
        estimate_note(.estimated)
    )]
    TooManyRows {
        count: u64,
        max: u64,
        estimated: bool,
    },

    /// The configured sheet does not exist
    #[error("Sheet index {0} not found in workbook")]
    SheetNotFound(usize),

    /// No schema is registered under the identifier
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// Import options are unusable
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A schema definition is inconsistent
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Optimistic persistence kept conflicting until the retry budget ran out
    #[error("Concurrent write conflict after {attempts} attempts")]
    ConcurrentWriteConflict { attempts: u32 },

    /// The persistence collaborator failed
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// No stored report matches the identifier
    #[error("Report not found: {0}")]
    ReportNotFound(String),
}

fn estimate_note(estimated: &bool) -> &'static str {
    if *estimated {
        " (estimated)"
    } else {
        ""
    }
}

fn join_resolution_errors(errors: &[ResolutionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
