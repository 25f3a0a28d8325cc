//! # sheetgate-core
//!
//! In-memory workbook model used by the sheetgate import pipeline.
//!
//! This crate provides the types shared by the reader, the writers and the pipeline:
//! - [`CellValue`] - Values as stored in a worksheet (numbers, text, booleans, errors, formulas)
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing and merged regions
//! - [`Style`] and [`StylePool`] - Property-level cell formatting with deduplication
//! - [`Workbook`], [`Worksheet`] - Sheets, column layout and merged regions
//!
//! ## Example
//!
//! ```rust
//! use sheetgate_core::{CellRange, CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value_at(0, 0, "Region").unwrap();
//! sheet.merge_cells(&CellRange::parse("A1:B1").unwrap()).unwrap();
//!
//! // B1 is covered by the merge, so it resolves to the master cell
//! assert_eq!(sheet.merged_value_at(0, 1), CellValue::from("Region"));
//! ```

pub mod cell;
pub mod date;
pub mod error;
pub mod style;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellData, CellRange, CellValue, ErrorValue, SharedString};
pub use error::{Error, Result};
pub use date::DateSystem;
pub use workbook::Workbook;
pub use worksheet::Worksheet;

pub use style::{
    Alignment, BorderEdge, BorderLineStyle, BorderStyle, Color, FillStyle, FontStyle,
    HorizontalAlignment, NumberFormat, Protection, Style, StylePool, VerticalAlignment,
};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
