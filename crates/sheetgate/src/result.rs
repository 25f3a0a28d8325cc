//! Error aggregation and import outcomes

use std::collections::BTreeMap;

use serde::Serialize;

/// One rejected cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellError {
    /// 0-based column; `None` when the field's column was not found in the file
    pub column_index: Option<u16>,
    /// Column letter, empty when the column is unknown
    pub column_letter: String,
    pub field: String,
    pub header: String,
    /// Raw cell text that was rejected
    pub raw_value: String,
    pub message: String,
}

impl CellError {
    /// Label used in formatted messages: the column letter, or the header when unknown
    pub fn location(&self) -> &str {
        if self.column_letter.is_empty() {
            &self.header
        } else {
            &self.column_letter
        }
    }
}

/// All errors of one sheet row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based sheet row
    pub row_number: u32,
    pub errors: Vec<CellError>,
}

impl RowError {
    pub fn new(row_number: u32) -> Self {
        Self {
            row_number,
            errors: Vec::new(),
        }
    }

    /// `[B] message; [D] message`
    pub fn formatted_message(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("[{}] {}", e.location(), e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Whether a field of this row already has an error
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// Row errors keyed by row number, one [`RowError`] per row
///
/// Every source of errors (coercion, validation passes, external checks) merges
/// through here, so a row never appears twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowErrorSet {
    rows: BTreeMap<u32, RowError>,
}

impl RowErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cell error against a row
    pub fn add(&mut self, row_number: u32, error: CellError) {
        self.rows
            .entry(row_number)
            .or_insert_with(|| RowError::new(row_number))
            .errors
            .push(error);
    }

    /// Merge a whole row error, appending to an existing entry for the same row
    pub fn merge(&mut self, row_error: RowError) {
        match self.rows.get_mut(&row_error.row_number) {
            Some(existing) => existing.errors.extend(row_error.errors),
            None => {
                if !row_error.errors.is_empty() {
                    self.rows.insert(row_error.row_number, row_error);
                }
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = RowError>>(&mut self, errors: I) {
        for error in errors {
            self.merge(error);
        }
    }

    pub fn get(&self, row_number: u32) -> Option<&RowError> {
        self.rows.get(&row_number)
    }

    /// Whether a given field of a row already failed
    pub fn has_field_error(&self, row_number: u32, field: &str) -> bool {
        self.rows
            .get(&row_number)
            .map_or(false, |row| row.has_field(field))
    }

    /// Number of rows with at least one error
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total number of cell errors
    pub fn error_count(&self) -> usize {
        self.rows.values().map(|r| r.errors.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row errors in row order
    pub fn into_vec(self) -> Vec<RowError> {
        self.rows.into_values().collect()
    }
}

impl FromIterator<RowError> for RowErrorSet {
    fn from_iter<I: IntoIterator<Item = RowError>>(iter: I) -> Self {
        let mut set = RowErrorSet::new();
        set.extend(iter);
        set
    }
}

/// Outcome of validating a parsed sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub total_rows: usize,
    /// Distinct rows with errors
    pub error_rows: usize,
    /// Cell errors across all rows
    pub error_count: usize,
    pub errors: Vec<RowError>,
}

impl ValidationResult {
    pub fn from_errors(total_rows: usize, errors: RowErrorSet) -> Self {
        Self {
            valid: errors.is_empty(),
            total_rows,
            error_rows: errors.row_count(),
            error_count: errors.error_count(),
            errors: errors.into_vec(),
        }
    }

    /// Merge more row errors under the one-entry-per-row rule
    pub fn merge(self, extra: Vec<RowError>) -> Self {
        let mut set: RowErrorSet = self.errors.into_iter().collect();
        set.extend(extra);
        Self::from_errors(self.total_rows, set)
    }

    pub fn row_error(&self, row_number: u32) -> Option<&RowError> {
        self.errors.iter().find(|e| e.row_number == row_number)
    }
}

/// What an import did, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub success: bool,
    pub rows_processed: usize,
    pub rows_created: usize,
    pub rows_updated: usize,
    pub error_rows: usize,
    pub error_count: usize,
    /// Identifier of the generated error report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    pub message: String,
}

impl ImportResult {
    /// Rows were persisted
    pub fn success(rows_processed: usize, created: usize, updated: usize) -> Self {
        Self {
            success: true,
            rows_processed,
            rows_created: created,
            rows_updated: updated,
            error_rows: 0,
            error_count: 0,
            report_id: None,
            message: format!(
                "Imported {} rows ({} created, {} updated)",
                rows_processed, created, updated
            ),
        }
    }

    /// Rows failed validation; a report was generated
    pub fn invalid(validation: &ValidationResult, report_id: String) -> Self {
        Self {
            success: false,
            rows_processed: validation.total_rows,
            rows_created: 0,
            rows_updated: 0,
            error_rows: validation.error_rows,
            error_count: validation.error_count,
            report_id: Some(report_id),
            message: format!(
                "{} errors in {} rows; see the error report",
                validation.error_count, validation.error_rows
            ),
        }
    }

    /// The import stopped on a fatal error
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows_processed: 0,
            rows_created: 0,
            rows_updated: 0,
            error_rows: 0,
            error_count: 0,
            report_id: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cell(letter: &str, field: &str, message: &str) -> CellError {
        CellError {
            column_index: Some(0),
            column_letter: letter.into(),
            field: field.into(),
            header: field.to_uppercase(),
            raw_value: String::new(),
            message: message.into(),
        }
    }

    #[test]
    fn test_formatted_message() {
        let mut row = RowError::new(4);
        row.errors.push(cell("B", "name", "is required"));
        row.errors.push(cell("", "age", "must be at least 0"));
        assert_eq!(row.formatted_message(), "[B] is required; [AGE] must be at least 0");
    }

    #[test]
    fn test_merge_keeps_one_entry_per_row() {
        let mut set = RowErrorSet::new();
        set.add(7, cell("A", "a", "first"));
        set.add(3, cell("A", "a", "other"));

        let mut external = RowError::new(7);
        external.errors.push(cell("C", "c", "exists already"));
        set.merge(external);
        set.merge(RowError::new(9));

        assert_eq!(set.row_count(), 2);
        assert_eq!(set.error_count(), 3);
        assert!(set.has_field_error(7, "c"));

        let rows = set.into_vec();
        assert_eq!(rows[0].row_number, 3);
        assert_eq!(rows[1].errors.len(), 2);
    }

    #[test]
    fn test_validation_result_merge() {
        let mut set = RowErrorSet::new();
        set.add(2, cell("A", "a", "bad"));
        let result = ValidationResult::from_errors(10, set);
        assert!(!result.valid);

        let mut extra = RowError::new(2);
        extra.errors.push(cell("B", "b", "dup"));
        let merged = result.merge(vec![extra, {
            let mut e = RowError::new(5);
            e.errors.push(cell("B", "b", "dup"));
            e
        }]);

        assert_eq!(merged.error_rows, 2);
        assert_eq!(merged.error_count, 3);
        assert_eq!(merged.total_rows, 10);
    }
}
