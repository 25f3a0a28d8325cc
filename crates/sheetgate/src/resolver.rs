//! Column resolution
//!
//! Maps each declared field onto a worksheet column, either at a fixed letter
//! or by scanning the header row. Resolution either succeeds for every
//! required field or fails with all problems at once.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::error::{ImportError, Result};
use crate::result::CellError;
use crate::schema::{ColumnSpec, MatchMode, Schema};
use crate::format::SheetView;
use sheetgate_core::CellAddress;

/// A required column that could not be matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub field: String,
    pub expected_header: String,
    /// Header found at the fixed column, if any
    pub actual_header: Option<String>,
    /// Fixed column letter; `None` in auto-detect mode
    pub column_letter: Option<String>,
    pub mode: MatchMode,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column_letter {
            Some(letter) => write!(
                f,
                "field '{}': column {} should match '{}' ({:?}) but has '{}'",
                self.field,
                letter,
                self.expected_header,
                self.mode,
                self.actual_header.as_deref().unwrap_or("")
            ),
            None => write!(
                f,
                "field '{}': no header matches '{}' ({:?})",
                self.field, self.expected_header, self.mode
            ),
        }
    }
}

/// A field resolved to a column for one parse run
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub field: String,
    /// Position of the field in the schema
    pub field_index: usize,
    pub spec: ColumnSpec,
    /// 0-based column
    pub column_index: u16,
    pub column_letter: String,
}

impl ColumnMapping {
    /// Error located at this mapping's column
    pub fn cell_error(
        &self,
        raw_value: impl Into<String>,
        message: impl Into<String>,
    ) -> CellError {
        CellError {
            column_index: Some(self.column_index),
            column_letter: self.column_letter.clone(),
            field: self.field.clone(),
            header: self.spec.header.clone(),
            raw_value: raw_value.into(),
            message: message.into(),
        }
    }
}

/// Resolved mappings of a schema, in field declaration order
///
/// Optional fields whose column was not found have no mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMappings {
    mappings: Vec<ColumnMapping>,
}

impl ColumnMappings {
    pub fn new(mappings: Vec<ColumnMapping>) -> Self {
        Self { mappings }
    }

    /// Mapping of a field by name
    pub fn get(&self, field: &str) -> Option<&ColumnMapping> {
        self.mappings.iter().find(|m| m.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Error for a field, located at its column when mapped
    ///
    /// Unmapped fields fall back to the header text so the message still reads.
    pub fn cell_error(
        &self,
        schema: &Schema,
        field: &str,
        raw_value: impl Into<String>,
        message: impl Into<String>,
    ) -> CellError {
        match self.get(field) {
            Some(mapping) => mapping.cell_error(raw_value, message),
            None => CellError {
                column_index: None,
                column_letter: String::new(),
                field: field.to_string(),
                header: schema
                    .field(field)
                    .map(|f| f.column.header.clone())
                    .unwrap_or_else(|| field.to_string()),
                raw_value: raw_value.into(),
                message: message.into(),
            },
        }
    }
}

/// Locates schema fields in a worksheet
pub struct ColumnResolver;

impl ColumnResolver {
    /// Resolve every field of `schema` against a 0-based header row
    pub fn resolve(
        schema: &Schema,
        view: &SheetView<'_>,
        header_row: u32,
    ) -> Result<ColumnMappings> {
        let headers = header_map(view, header_row);
        log::debug!(
            "header row {} of '{}' has {} labelled columns",
            header_row + 1,
            view.sheet().name(),
            headers.len()
        );

        let mut mappings = Vec::with_capacity(schema.fields.len());
        let mut errors = Vec::new();

        for (field_index, field) in schema.fields.iter().enumerate() {
            let spec = &field.column;
            let matcher = HeaderMatcher::new(spec)?;

            let found = match &spec.column {
                Some(letter) => {
                    let column = CellAddress::letters_to_column(letter)?;
                    let actual = headers.get(&column);
                    if actual.map_or(false, |text| matcher.matches(text)) {
                        Some(column)
                    } else {
                        if spec.required {
                            errors.push(ResolutionError {
                                field: field.name.clone(),
                                expected_header: spec.header.clone(),
                                actual_header: actual.cloned(),
                                column_letter: Some(CellAddress::column_to_letters(column)),
                                mode: spec.match_mode,
                            });
                        }
                        None
                    }
                }
                None => {
                    let first = headers
                        .iter()
                        .find(|(_, text)| matcher.matches(text))
                        .map(|(&col, _)| col);
                    if first.is_none() && spec.required {
                        errors.push(ResolutionError {
                            field: field.name.clone(),
                            expected_header: spec.header.clone(),
                            actual_header: None,
                            column_letter: None,
                            mode: spec.match_mode,
                        });
                    }
                    first
                }
            };

            match found {
                Some(column_index) => mappings.push(ColumnMapping {
                    field: field.name.clone(),
                    field_index,
                    spec: spec.clone(),
                    column_index,
                    column_letter: CellAddress::column_to_letters(column_index),
                }),
                None if !spec.required => {
                    log::warn!(
                        "optional field '{}' (header '{}') not found; skipped",
                        field.name,
                        spec.header
                    );
                }
                None => {}
            }
        }

        if !errors.is_empty() {
            return Err(ImportError::ColumnResolution(errors));
        }
        Ok(ColumnMappings::new(mappings))
    }
}

/// Trimmed header text per column, merged cells resolved to their master value
fn header_map(view: &SheetView<'_>, row: u32) -> BTreeMap<u16, String> {
    let sheet = view.sheet();
    let last_cell = sheet.row_cells(row).map(|(col, _)| col).max();
    let last_merged = sheet
        .merged_regions()
        .iter()
        .filter(|r| r.start.row <= row && row <= r.end.row)
        .map(|r| r.end.col)
        .max();
    let last_col = match (last_cell, last_merged) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return BTreeMap::new(),
    };

    (0..=last_col)
        .filter_map(|col| {
            let text = view.text(row, col);
            let text = text.trim();
            (!text.is_empty()).then(|| (col, text.to_string()))
        })
        .collect()
}

/// Compiled comparison for one column spec
enum HeaderMatcher {
    Text { expected: String, mode: MatchMode },
    Pattern(Regex),
}

impl HeaderMatcher {
    fn new(spec: &ColumnSpec) -> Result<Self> {
        match spec.match_mode {
            MatchMode::Regex => {
                let pattern = format!("(?i)^(?:{})$", spec.header.trim());
                Regex::new(&pattern)
                    .map(HeaderMatcher::Pattern)
                    .map_err(|e| ImportError::InvalidSchema(format!("header pattern: {}", e)))
            }
            mode => Ok(HeaderMatcher::Text {
                expected: spec.header.trim().to_lowercase(),
                mode,
            }),
        }
    }

    fn matches(&self, actual: &str) -> bool {
        let actual = actual.trim();
        match self {
            HeaderMatcher::Pattern(re) => re.is_match(actual),
            HeaderMatcher::Text { expected, mode } => {
                let actual = actual.to_lowercase();
                match mode {
                    MatchMode::Contains => actual.contains(expected.as_str()),
                    MatchMode::StartsWith => actual.starts_with(expected.as_str()),
                    _ => actual == *expected,
                }
            }
        }
    }
}
