//! Per-cell type coercion

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::format::{cell_text, parse_date, parse_datetime};
use crate::record::FieldValue;
use crate::schema::FieldType;
use crate::security::SecurityGuard;
use sheetgate_core::{CellValue, DateSystem};

/// A cell that could not be converted to its field type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Cell text as shown to the user
    pub raw: String,
    pub message: String,
}

/// Converts cell values to field values
#[derive(Debug, Clone, Copy)]
pub struct Coercer {
    date_system: DateSystem,
}

impl Coercer {
    pub fn new(date_system: DateSystem) -> Self {
        Self { date_system }
    }

    /// Coerce one cell
    ///
    /// `is_date` says whether the cell's number format shows a date; `pattern`
    /// is the field's text pattern for dates.
    pub fn coerce(
        &self,
        value: &CellValue,
        is_date: bool,
        field_type: FieldType,
        pattern: Option<&str>,
    ) -> Result<FieldValue, CoercionError> {
        let value = value.effective_value();
        let text = cell_text(value, is_date, self.date_system);
        let trimmed = text.trim();

        let fail = |detail: Option<String>| {
            let mut message = format!("'{}' is not a valid {}", trimmed, field_type.display_name());
            if let Some(detail) = detail {
                message.push_str(&format!(" ({})", detail));
            }
            Err(CoercionError {
                raw: trimmed.to_string(),
                message,
            })
        };

        match field_type {
            FieldType::String => {
                if trimmed.is_empty() {
                    return Ok(FieldValue::Null);
                }
                let clean = SecurityGuard::sanitize_cell_text(trimmed);
                Ok(FieldValue::String(clean.into_owned()))
            }

            FieldType::Integer => match value {
                _ if trimmed.is_empty() => Ok(FieldValue::Null),
                CellValue::Number(n) => {
                    let truncated = n.trunc();
                    if truncated.is_finite() && truncated.abs() < i64::MAX as f64 {
                        Ok(FieldValue::Integer(truncated as i64))
                    } else {
                        fail(Some("out of range".into()))
                    }
                }
                CellValue::String(_) => match strip_number(trimmed).parse::<i64>() {
                    Ok(n) => Ok(FieldValue::Integer(n)),
                    Err(_) => fail(None),
                },
                _ => fail(None),
            },

            FieldType::Decimal => match value {
                _ if trimmed.is_empty() => Ok(FieldValue::Null),
                CellValue::Number(n) => match Decimal::from_str(&n.to_string()) {
                    Ok(d) => Ok(FieldValue::Decimal(d.normalize())),
                    Err(_) => fail(Some("out of range".into())),
                },
                CellValue::String(_) => match parse_decimal(&strip_number(trimmed)) {
                    Some(d) => Ok(FieldValue::Decimal(d)),
                    None => fail(None),
                },
                _ => fail(None),
            },

            FieldType::Date => match value {
                _ if trimmed.is_empty() => Ok(FieldValue::Null),
                CellValue::Number(n) if is_date => match self.date_system.serial_to_datetime(*n) {
                    Some(dt) => Ok(FieldValue::Date(dt.date())),
                    None => fail(Some("out of range".into())),
                },
                CellValue::String(_) => match parse_date(trimmed, pattern) {
                    Some(d) => Ok(FieldValue::Date(d)),
                    None => fail(pattern.map(|p| format!("expected {}", p))),
                },
                _ => fail(pattern.map(|p| format!("expected {}", p))),
            },

            FieldType::DateTime => match value {
                _ if trimmed.is_empty() => Ok(FieldValue::Null),
                CellValue::Number(n) if is_date => match self.date_system.serial_to_datetime(*n) {
                    Some(dt) => Ok(FieldValue::DateTime(dt)),
                    None => fail(Some("out of range".into())),
                },
                CellValue::String(_) => match parse_datetime(trimmed, pattern) {
                    Some(dt) => Ok(FieldValue::DateTime(dt)),
                    None => fail(pattern.map(|p| format!("expected {}", p))),
                },
                _ => fail(pattern.map(|p| format!("expected {}", p))),
            },

            FieldType::Boolean => match value {
                CellValue::Boolean(b) => Ok(FieldValue::Boolean(*b)),
                _ => Ok(FieldValue::Boolean(
                    trimmed.eq_ignore_ascii_case("y") || trimmed.eq_ignore_ascii_case("true"),
                )),
            },
        }
    }
}

/// Drop thousands separators and whitespace
fn strip_number(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect()
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).ok()
    } else {
        Decimal::from_str(text).ok()
    }
}
