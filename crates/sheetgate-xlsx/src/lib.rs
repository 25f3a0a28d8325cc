//! # sheetgate-xlsx
//!
//! Hardened XLSX (Office Open XML) reader and writers for sheetgate.
//!
//! - [`XlsxReader`] loads a whole workbook under [`ReadLimits`]
//! - [`count_rows`] counts the rows of one sheet without building cells
//! - [`XlsxWriter`] writes an in-memory workbook
//! - [`StreamingWriter`] writes rows forward-only through a bounded window

pub mod count;
pub mod error;
pub mod limits;
pub mod reader;
pub mod writer;

mod package;
mod styles;
mod xml;

pub use count::count_rows;
pub use error::{XlsxError, XlsxResult};
pub use limits::{LimitedReader, ReadLimits};
pub use package::SheetEntry;
pub use reader::XlsxReader;
pub use writer::{SheetLayout, StreamRow, StreamingWriter, XlsxWriter};
