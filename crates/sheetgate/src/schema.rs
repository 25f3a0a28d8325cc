//! Record schemas
//!
//! A [`Schema`] declares the fields of one import: how each field's column is
//! found, what type its cells coerce to, and which constraints the value must
//! satisfy. Schemas are built in code with [`SchemaBuilder`] or loaded from JSON.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, Result};
use sheetgate_core::CellAddress;

/// Target type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Decimal,
    Date,
    DateTime,
    Boolean,
}

impl FieldType {
    /// Name used in coercion error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            FieldType::String => "text",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::DateTime => "date/time",
            FieldType::Boolean => "boolean",
        }
    }
}

/// How a header cell is compared with the declared header text
///
/// Every mode compares whitespace-trimmed, case-insensitive text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
    StartsWith,
    Regex,
}

/// Where a field's column is and how its header is recognised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header text (a pattern in [`MatchMode::Regex`] mode)
    pub header: String,
    /// Fixed column letter; `None` auto-detects the column from the header row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Value pattern for date and date/time text, e.g. `yyyy-MM-dd`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Whether the column must be present in the header row
    #[serde(default = "default_true")]
    pub required: bool,
    /// Prepended to this field's validation messages
    #[serde(default)]
    pub message_prefix: String,
}

fn default_true() -> bool {
    true
}

/// Constraints checked by the structural validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// The value must be present
    pub not_null: bool,
    /// Minimum text length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum text length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Inclusive lower bound for numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression the whole text must match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// One declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub column: ColumnSpec,
    #[serde(default)]
    pub constraints: Constraints,
    /// Values must not repeat within one file
    #[serde(default)]
    pub unique: bool,
}

impl FieldDef {
    /// Field with an auto-detected, required column matched exactly
    pub fn new(name: impl Into<String>, field_type: FieldType, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            column: ColumnSpec {
                header: header.into(),
                column: None,
                match_mode: MatchMode::Exact,
                format: None,
                required: true,
                message_prefix: String::new(),
            },
            constraints: Constraints::default(),
            unique: false,
        }
    }

    /// Pin the field to a column letter
    pub fn at_column(mut self, letter: impl Into<String>) -> Self {
        self.column.column = Some(letter.into());
        self
    }

    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.column.match_mode = mode;
        self
    }

    /// Value pattern for date fields
    pub fn format(mut self, pattern: impl Into<String>) -> Self {
        self.column.format = Some(pattern.into());
        self
    }

    /// The column may be absent from the file
    pub fn optional_column(mut self) -> Self {
        self.column.required = false;
        self
    }

    pub fn message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.column.message_prefix = prefix.into();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.not_null = true;
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.constraints.min_length = min;
        self.constraints.max_length = max;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.min = min;
        self.constraints.max = max;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Sheet layout of an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// 1-based header row
    pub header_row: u32,
    /// 1-based first data row
    pub data_start_row: u32,
    /// 0-based sheet index
    pub sheet_index: usize,
    /// A row containing this text ends the data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_marker: Option<String>,
    /// Header of the column appended to error reports
    pub error_column_header: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            header_row: 1,
            data_start_row: 2,
            sheet_index: 0,
            footer_marker: None,
            error_column_header: "Errors".to_string(),
        }
    }
}

/// A complete import schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    pub fields: Vec<FieldDef>,
    /// Field groups whose combined values must not repeat within one file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_groups: Vec<Vec<String>>,
    #[serde(default)]
    pub config: ImportConfig,
}

impl Schema {
    /// Start building a schema
    pub fn builder(id: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                id: id.into(),
                fields: Vec::new(),
                unique_groups: Vec::new(),
                config: ImportConfig::default(),
            },
        }
    }

    /// Parse and validate a schema from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: Schema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Check the schema for internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |msg: String| Err(ImportError::InvalidSchema(format!("{}: {}", self.id, msg)));

        if self.id.trim().is_empty() {
            return Err(ImportError::InvalidSchema("schema id is empty".into()));
        }
        if self.fields.is_empty() {
            return invalid("no fields declared".into());
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return invalid(format!("duplicate field '{}'", field.name));
            }
            if let Some(letter) = &field.column.column {
                if CellAddress::letters_to_column(letter).is_err() {
                    return invalid(format!(
                        "field '{}' has invalid column '{}'",
                        field.name, letter
                    ));
                }
            }
            if field.column.match_mode == MatchMode::Regex {
                if let Err(e) = Regex::new(&field.column.header) {
                    return invalid(format!("field '{}' header pattern: {}", field.name, e));
                }
            }
            if let Some(pattern) = &field.constraints.pattern {
                if let Err(e) = Regex::new(pattern) {
                    return invalid(format!("field '{}' value pattern: {}", field.name, e));
                }
            }
        }

        for group in &self.unique_groups {
            if group.is_empty() {
                return invalid("empty unique group".into());
            }
            if let Some(unknown) = group.iter().find(|name| !names.contains(name.as_str())) {
                return invalid(format!("unique group references unknown field '{}'", unknown));
            }
        }

        if self.config.header_row == 0 {
            return invalid("header_row is 1-based".into());
        }
        if self.config.data_start_row <= self.config.header_row {
            return invalid(format!(
                "data_start_row {} must come after header_row {}",
                self.config.data_start_row, self.config.header_row
            ));
        }
        Ok(())
    }
}

/// Builder for [`Schema`]
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn field(mut self, field: FieldDef) -> Self {
        self.schema.fields.push(field);
        self
    }

    /// Declare a group of fields whose combined values must be unique
    pub fn unique_group<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.schema
            .unique_groups
            .push(fields.iter().map(|f| f.as_ref().to_string()).collect());
        self
    }

    pub fn config(mut self, config: ImportConfig) -> Self {
        self.schema.config = config;
        self
    }

    pub fn header_row(mut self, row: u32) -> Self {
        self.schema.config.header_row = row;
        self
    }

    pub fn data_start_row(mut self, row: u32) -> Self {
        self.schema.config.data_start_row = row;
        self
    }

    pub fn sheet_index(mut self, index: usize) -> Self {
        self.schema.config.sheet_index = index;
        self
    }

    pub fn footer_marker(mut self, marker: impl Into<String>) -> Self {
        self.schema.config.footer_marker = Some(marker.into());
        self
    }

    pub fn error_column_header(mut self, header: impl Into<String>) -> Self {
        self.schema.config.error_column_header = header.into();
        self
    }

    /// Validate and return the schema
    pub fn build(self) -> Result<Schema> {
        self.schema.validate()?;
        Ok(self.schema)
    }
}
