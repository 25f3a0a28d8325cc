//! Row validation
//!
//! Three passes over the parsed rows: field constraints, single-field
//! uniqueness and composite uniqueness. Each pass adds to one [`RowErrorSet`],
//! so a row with several problems ends up with a single [`RowError`](crate::RowError).

use std::collections::HashMap;

use regex::Regex;

use crate::error::{ImportError, Result};
use crate::format::number_text;
use crate::record::{FieldValue, ParsedRows};
use crate::resolver::ColumnMappings;
use crate::result::{RowErrorSet, ValidationResult};
use crate::schema::{FieldDef, Schema};

/// Runs the validation passes of a schema
pub struct ValidationEngine<'a> {
    schema: &'a Schema,
    mappings: &'a ColumnMappings,
    patterns: Vec<Option<Regex>>,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(schema: &'a Schema, mappings: &'a ColumnMappings) -> Result<Self> {
        let patterns = schema
            .fields
            .iter()
            .map(|field| {
                field
                    .constraints
                    .pattern
                    .as_deref()
                    .map(|p| {
                        Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                            ImportError::InvalidSchema(format!(
                                "field '{}' pattern: {}",
                                field.name, e
                            ))
                        })
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            mappings,
            patterns,
        })
    }

    /// Validate `rows`, merging into the errors already found while parsing
    ///
    /// Cells that failed coercion are not checked again.
    pub fn validate(&self, rows: &ParsedRows, mut errors: RowErrorSet) -> ValidationResult {
        self.check_constraints(rows, &mut errors);
        self.check_unique_fields(rows, &mut errors);
        self.check_unique_groups(rows, &mut errors);

        let result = ValidationResult::from_errors(rows.len(), errors);
        log::debug!(
            "validated {} rows: {} rows with {} errors",
            result.total_rows,
            result.error_rows,
            result.error_count
        );
        result
    }

    fn check_constraints(&self, rows: &ParsedRows, errors: &mut RowErrorSet) {
        for (row_number, record) in rows.iter() {
            for (index, field) in self.schema.fields.iter().enumerate() {
                if errors.has_field_error(row_number, &field.name) {
                    continue;
                }
                let Some(value) = record.get_at(index) else {
                    continue;
                };
                let pattern = self.patterns.get(index).and_then(Option::as_ref);
                for message in constraint_violations(field, value, pattern) {
                    let message = with_prefix(&field.column.message_prefix, &message);
                    let error = self
                        .mappings
                        .cell_error(self.schema, &field.name, value.to_string(), message);
                    errors.add(row_number, error);
                }
            }
        }
    }

    fn check_unique_fields(&self, rows: &ParsedRows, errors: &mut RowErrorSet) {
        for (index, field) in self.schema.fields.iter().enumerate() {
            if !field.unique {
                continue;
            }
            let mut first_rows: HashMap<&FieldValue, u32> = HashMap::new();
            for (row_number, record) in rows.iter() {
                let Some(value) = record.get_at(index).filter(|v| !v.is_null()) else {
                    continue;
                };
                match first_rows.get(value) {
                    Some(&first) => {
                        let message =
                            format!("duplicate value '{}' (first seen in row {})", value, first);
                        let error = self
                            .mappings
                            .cell_error(self.schema, &field.name, value.to_string(), message);
                        errors.add(row_number, error);
                    }
                    None => {
                        first_rows.insert(value, row_number);
                    }
                }
            }
        }
    }

    fn check_unique_groups(&self, rows: &ParsedRows, errors: &mut RowErrorSet) {
        for group in &self.schema.unique_groups {
            let indices: Vec<usize> = group
                .iter()
                .filter_map(|name| self.schema.field_index(name))
                .collect();
            let Some(first_field) = group.first() else {
                continue;
            };

            let mut first_rows: HashMap<Vec<&FieldValue>, u32> = HashMap::new();
            for (row_number, record) in rows.iter() {
                let key: Vec<&FieldValue> = indices
                    .iter()
                    .filter_map(|&i| record.get_at(i))
                    .collect();
                match first_rows.get(&key) {
                    Some(&first) => {
                        let raw = key.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" / ");
                        let message = format!(
                            "duplicate combination of {} (first seen in row {})",
                            group.join(", "),
                            first
                        );
                        errors.add(
                            row_number,
                            self.mappings.cell_error(self.schema, first_field, raw, message),
                        );
                    }
                    None => {
                        first_rows.insert(key, row_number);
                    }
                }
            }
        }
    }
}

fn with_prefix(prefix: &str, message: &str) -> String {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        message.to_string()
    } else {
        format!("{} {}", prefix, message)
    }
}

/// Messages for every constraint `value` breaks
fn constraint_violations(
    field: &FieldDef,
    value: &FieldValue,
    pattern: Option<&Regex>,
) -> Vec<String> {
    let c = &field.constraints;
    let mut messages = Vec::new();

    if value.is_null() {
        if c.not_null {
            messages.push("is required".to_string());
        }
        return messages;
    }

    if let Some(text) = value.as_str() {
        let len = text.chars().count();
        if let Some(min) = c.min_length.filter(|&min| len < min) {
            messages.push(format!("must be at least {} characters", min));
        }
        if let Some(max) = c.max_length.filter(|&max| len > max) {
            messages.push(format!("must be at most {} characters", max));
        }
        if let Some(re) = pattern {
            if !re.is_match(text) {
                messages.push("does not have the expected format".to_string());
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = c.min.filter(|&min| n < min) {
            messages.push(format!("must be at least {}", number_text(min)));
        }
        if let Some(max) = c.max.filter(|&max| n > max) {
            messages.push(format!("must be at most {}", number_text(max)));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::resolver::ColumnMapping;
    use crate::schema::FieldType;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn schema() -> Schema {
        Schema::builder("items")
            .field(
                FieldDef::new("code", FieldType::String, "Code")
                    .not_null()
                    .unique()
                    .pattern("[A-Z]{3}"),
            )
            .field(
                FieldDef::new("qty", FieldType::Integer, "Qty")
                    .range(Some(1.0), Some(99.0))
                    .message_prefix("Quantity"),
            )
            .field(FieldDef::new("a", FieldType::String, "A").optional_column())
            .field(FieldDef::new("b", FieldType::String, "B").optional_column())
            .unique_group(&["a", "b", "qty"])
            .build()
            .unwrap()
    }

    fn mappings(schema: &Schema) -> ColumnMappings {
        ColumnMappings::new(
            schema
                .fields
                .iter()
                .enumerate()
                .map(|(i, f)| ColumnMapping {
                    field: f.name.clone(),
                    field_index: i,
                    spec: f.column.clone(),
                    column_index: i as u16,
                    column_letter: sheetgate_core::CellAddress::column_to_letters(i as u16),
                })
                .collect(),
        )
    }

    fn rows(schema: &Schema, data: &[(u32, [FieldValue; 4])]) -> ParsedRows {
        let names: Arc<[String]> = schema.field_names().into();
        let mut rows = ParsedRows::new();
        for (row, values) in data {
            let mut record = Record::new(names.clone());
            for (i, v) in values.iter().enumerate() {
                record.set_at(i, v.clone());
            }
            rows.push(record, *row);
        }
        rows
    }

    fn s(text: &str) -> FieldValue {
        FieldValue::String(text.into())
    }

    #[test]
    fn test_structural_checks() {
        let schema = schema();
        let mappings = mappings(&schema);
        let data = rows(
            &schema,
            &[
                (2, [FieldValue::Null, FieldValue::Integer(5), s("x"), s("1")]),
                (3, [s("abc"), FieldValue::Integer(150), s("x"), s("2")]),
            ],
        );

        let engine = ValidationEngine::new(&schema, &mappings).unwrap();
        let result = engine.validate(&data, RowErrorSet::new());
        assert_eq!(result.error_rows, 2);
        assert_eq!(result.row_error(2).unwrap().formatted_message(), "[A] is required");
        assert_eq!(
            result.row_error(3).unwrap().formatted_message(),
            "[A] does not have the expected format; [B] Quantity must be at most 99"
        );
    }

    #[test]
    fn test_duplicates_reference_first_row() {
        let schema = schema();
        let mappings = mappings(&schema);
        let data = rows(
            &schema,
            &[
                (2, [s("AAA"), FieldValue::Integer(1), s("p"), s("1")]),
                (4, [s("BBB"), FieldValue::Integer(1), FieldValue::Null, s("2")]),
                (5, [s("AAA"), FieldValue::Integer(2), FieldValue::Null, s("3")]),
                (6, [s("CCC"), FieldValue::Integer(3), FieldValue::Null, s("4")]),
            ],
        );

        let engine = ValidationEngine::new(&schema, &mappings).unwrap();
        let result = engine.validate(&data, RowErrorSet::new());
        assert_eq!(result.error_rows, 1);
        let error = result.row_error(5).unwrap();
        assert_eq!(error.errors[0].field, "code");
        assert_eq!(error.errors[0].message, "duplicate value 'AAA' (first seen in row 2)");
    }

    #[test]
    fn test_composite_duplicate_includes_nulls() {
        let schema = schema();
        let mappings = mappings(&schema);
        let data = rows(
            &schema,
            &[
                (7, [s("AAA"), FieldValue::Integer(3), s("X"), s("Y")]),
                (8, [s("BBB"), FieldValue::Integer(3), FieldValue::Null, s("Y")]),
                (9, [s("CCC"), FieldValue::Integer(3), s("X"), s("Y")]),
                (10, [s("DDD"), FieldValue::Integer(3), FieldValue::Null, s("Y")]),
            ],
        );

        let engine = ValidationEngine::new(&schema, &mappings).unwrap();
        let result = engine.validate(&data, RowErrorSet::new());
        assert_eq!(result.error_rows, 2);

        let error = &result.row_error(9).unwrap().errors[0];
        assert_eq!(error.field, "a");
        assert_eq!(error.raw_value, "X / Y / 3");
        assert_eq!(error.message, "duplicate combination of a, b, qty (first seen in row 7)");
        assert!(result.row_error(10).unwrap().errors[0].message.contains("row 8"));
    }

    #[test]
    fn test_coercion_errors_are_not_checked_again() {
        let schema = schema();
        let mappings = mappings(&schema);
        let data = rows(&schema, &[(2, [s("AAA"), FieldValue::Null, s("x"), s("y")])]);

        let mut seed = RowErrorSet::new();
        seed.add(2, mappings.get("qty").unwrap().cell_error("ten", "'ten' is not a valid integer"));

        let engine = ValidationEngine::new(&schema, &mappings).unwrap();
        let result = engine.validate(&data, seed);
        assert_eq!(result.error_count, 1);
        assert!(result.row_error(2).unwrap().has_field("qty"));
    }
}
