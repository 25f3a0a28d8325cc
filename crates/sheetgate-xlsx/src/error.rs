//! XLSX error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur during XLSX reading/writing
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Password-protected workbooks are stored in an OLE container, not a ZIP package
    #[error("Workbook is encrypted or password protected")]
    Encrypted,

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// A part declares a DOCTYPE, which could pull in external entities
    #[error("DOCTYPE declarations are not allowed (in {0})")]
    ForbiddenXml(String),

    /// The archive exceeds one of the configured read limits
    #[error("Archive limit exceeded: {0}")]
    LimitExceeded(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Sheet index out of range
    #[error("Sheet index {0} not found")]
    SheetNotFound(usize),

    /// Streaming writes must move forward
    #[error("Row {row} written after row {last}; rows must be written in ascending order")]
    RowOutOfOrder { row: u32, last: u32 },

    /// Streaming writer used in the wrong state
    #[error("Invalid writer state: {0}")]
    InvalidState(&'static str),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] sheetgate_core::Error),
}
