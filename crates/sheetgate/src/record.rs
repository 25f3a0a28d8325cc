//! Typed records produced by the row parser

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A coerced field value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FieldValue {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Boolean(bool),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used for range checks
    pub fn as_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        match self {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            FieldValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Integer(n) => serializer.serialize_i64(*n),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            // Decimals go out as strings to keep every digit
            other => serializer.collect_str(other),
        }
    }
}

/// One parsed row: a value per schema field, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    names: Arc<[String]>,
    values: Vec<FieldValue>,
}

impl Record {
    /// Create a record with every field null
    pub fn new(names: Arc<[String]>) -> Self {
        let values = vec![FieldValue::Null; names.len()];
        Self { names, values }
    }

    /// Value of a field; `None` when the schema has no such field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.position(name).map(|i| &self.values[i])
    }

    /// Value by field position
    pub fn get_at(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index)
    }

    /// Set a field; returns `false` when the schema has no such field
    pub fn set(&mut self, name: &str, value: FieldValue) -> bool {
        match self.position(name) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_at(&mut self, index: usize, value: FieldValue) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// `(name, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    /// The record as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(name, value)| {
                    let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                    (name.to_string(), json)
                })
                .collect(),
        )
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parsed records with the 1-based sheet row each came from
///
/// Records and row numbers always have the same length, and row numbers are
/// strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRows {
    records: Vec<Record>,
    row_numbers: Vec<u32>,
}

impl ParsedRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; rows that do not come after the last one are dropped
    pub(crate) fn push(&mut self, record: Record, row_number: u32) {
        if self.row_numbers.last().map_or(false, |&last| row_number <= last) {
            log::warn!("row {} arrived out of order; dropped", row_number);
            return;
        }
        self.records.push(record);
        self.row_numbers.push(row_number);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn row_numbers(&self) -> &[u32] {
        &self.row_numbers
    }

    /// `(row_number, record)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Record)> {
        self.row_numbers.iter().copied().zip(self.records.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn names() -> Arc<[String]> {
        vec!["id".to_string(), "price".to_string(), "day".to_string()].into()
    }

    #[test]
    fn test_record_access_and_json() {
        let mut record = Record::new(names());
        assert!(record.set("id", FieldValue::Integer(7)));
        assert!(record.set("price", FieldValue::Decimal(Decimal::from_str("12.50").unwrap())));
        assert!(!record.set("missing", FieldValue::Boolean(true)));

        assert_eq!(record.get("id"), Some(&FieldValue::Integer(7)));
        assert_eq!(record.get("day"), Some(&FieldValue::Null));
        assert_eq!(
            record.to_json(),
            serde_json::json!({"id": 7, "price": "12.50", "day": null})
        );
    }

    #[test]
    fn test_parsed_rows_stay_in_lockstep() {
        let mut rows = ParsedRows::new();
        rows.push(Record::new(names()), 3);
        rows.push(Record::new(names()), 5);
        rows.push(Record::new(names()), 4);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows.row_numbers(), &[3, 5]);
        assert_eq!(rows.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec![3, 5]);
    }
}
