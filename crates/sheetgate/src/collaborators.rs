//! Injected collaborators: persistence and external uniqueness checks
//!
//! The pipeline never stores rows itself. A schema is registered together with
//! a [`PersistenceHandler`] that receives the validated rows, and optionally an
//! [`ExternalUniquenessChecker`] that compares them with data outside the file.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;

use crate::common::CommonData;
use crate::error::{ImportError, Result};
use crate::record::{ParsedRows, Record};
use crate::resolver::ColumnMappings;
use crate::result::RowError;
use crate::retry::{retry_with_policy, Attempt, RetryPolicy};

/// Rows written by a persistence handler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistOutcome {
    pub created: usize,
    pub updated: usize,
}

/// Stores validated rows
pub trait PersistenceHandler: Send + Sync {
    fn persist(&self, rows: &ParsedRows, context: &dyn CommonData) -> Result<PersistOutcome>;
}

/// Checks rows against data outside the file
///
/// Returned errors are merged with the file's own validation errors, one
/// [`RowError`] per row.
pub trait ExternalUniquenessChecker: Send + Sync {
    fn check(
        &self,
        rows: &ParsedRows,
        mappings: &ColumnMappings,
        context: &dyn CommonData,
    ) -> Result<Vec<RowError>>;
}

impl<F> PersistenceHandler for F
where
    F: Fn(&ParsedRows, &dyn CommonData) -> Result<PersistOutcome> + Send + Sync,
{
    fn persist(&self, rows: &ParsedRows, context: &dyn CommonData) -> Result<PersistOutcome> {
        self(rows, context)
    }
}

impl<F> ExternalUniquenessChecker for F
where
    F: Fn(&ParsedRows, &ColumnMappings, &dyn CommonData) -> Result<Vec<RowError>> + Send + Sync,
{
    fn check(
        &self,
        rows: &ParsedRows,
        mappings: &ColumnMappings,
        context: &dyn CommonData,
    ) -> Result<Vec<RowError>> {
        self(rows, mappings, context)
    }
}

/// Appends every row as one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonLinesPersistence {
    path: PathBuf,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    row: u32,
    key: Vec<String>,
    record: &'a Record,
}

impl JsonLinesPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PersistenceHandler for JsonLinesPersistence {
    fn persist(&self, rows: &ParsedRows, context: &dyn CommonData) -> Result<PersistOutcome> {
        let file = File::options().create(true).append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        let key = context.isolation_key();

        for (row, record) in rows.iter() {
            let line = JsonLine {
                row,
                key: key.clone(),
                record,
            };
            serde_json::to_writer(&mut out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        log::info!("appended {} rows to {}", rows.len(), self.path.display());
        Ok(PersistOutcome {
            created: rows.len(),
            updated: 0,
        })
    }
}

/// In-memory table keyed by one field, committed with optimistic versioning
///
/// A batch is prepared against a snapshot of the table version and committed
/// only if no other batch committed in between; otherwise it is prepared again.
#[derive(Debug)]
pub struct MemoryStore {
    key_field: String,
    policy: RetryPolicy,
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    version: u64,
    rows: HashMap<(Vec<String>, String), Record>,
}

impl MemoryStore {
    pub fn new(key_field: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            key_field: key_field.into(),
            policy,
            table: Mutex::new(Table::default()),
        }
    }

    /// Stored record for a key within an isolation scope
    pub fn get(&self, scope: &[String], key: &str) -> Option<Record> {
        let table = self.table.lock().ok()?;
        table.rows.get(&(scope.to_vec(), key.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current table version
    pub fn version(&self) -> u64 {
        self.table.lock().map(|t| t.version).unwrap_or(0)
    }

    fn snapshot(&self) -> Result<(u64, HashSet<(Vec<String>, String)>)> {
        let table = self.lock()?;
        Ok((table.version, table.rows.keys().cloned().collect()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Table>> {
        self.table
            .lock()
            .map_err(|_| ImportError::Persistence("store lock poisoned".into()))
    }

    fn key_of(&self, record: &Record) -> Option<String> {
        record
            .get(&self.key_field)
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
    }
}

impl PersistenceHandler for MemoryStore {
    fn persist(&self, rows: &ParsedRows, context: &dyn CommonData) -> Result<PersistOutcome> {
        let scope = context.isolation_key();

        retry_with_policy(&self.policy, |attempt| {
            let (version, existing) = self.snapshot().map_err(Attempt::Abort)?;
            let mut outcome = PersistOutcome::default();
            let mut batch = Vec::with_capacity(rows.len());

            for (row, record) in rows.iter() {
                let key = self.key_of(record).ok_or_else(|| {
                    Attempt::Abort(ImportError::Persistence(format!(
                        "row {} has no value for key field '{}'",
                        row, self.key_field
                    )))
                })?;
                let id = (scope.clone(), key);
                if existing.contains(&id) {
                    outcome.updated += 1;
                } else {
                    outcome.created += 1;
                }
                batch.push((id, record.clone()));
            }

            let mut table = self.lock().map_err(Attempt::Abort)?;
            if table.version != version {
                return Err(Attempt::Retry(ImportError::Persistence(format!(
                    "table changed during attempt {}",
                    attempt
                ))));
            }
            table.rows.extend(batch);
            table.version += 1;
            Ok(outcome)
        })
        .into_result()
    }
}

impl ExternalUniquenessChecker for MemoryStore {
    /// Rows whose key already exists in the caller's scope
    fn check(
        &self,
        rows: &ParsedRows,
        mappings: &ColumnMappings,
        context: &dyn CommonData,
    ) -> Result<Vec<RowError>> {
        let scope = context.isolation_key();
        let table = self.lock()?;
        let mut errors = Vec::new();

        for (row, record) in rows.iter() {
            let Some(key) = self.key_of(record) else {
                continue;
            };
            if table.rows.contains_key(&(scope.clone(), key.clone())) {
                let mut error = RowError::new(row);
                let message = format!("'{}' already exists", key);
                error.errors.push(match mappings.get(&self.key_field) {
                    Some(mapping) => mapping.cell_error(key, message),
                    None => crate::result::CellError {
                        column_index: None,
                        column_letter: String::new(),
                        field: self.key_field.clone(),
                        header: self.key_field.clone(),
                        raw_value: key,
                        message,
                    },
                });
                errors.push(error);
            }
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::KeyValueContext;
    use crate::record::FieldValue;
    use std::sync::Arc;

    fn rows(codes: &[&str]) -> ParsedRows {
        let names: Arc<[String]> = vec!["code".to_string(), "qty".to_string()].into();
        let mut rows = ParsedRows::new();
        for (i, code) in codes.iter().enumerate() {
            let mut record = Record::new(names.clone());
            record.set("code", FieldValue::String(code.to_string()));
            record.set("qty", FieldValue::Integer(i as i64));
            rows.push(record, i as u32 + 2);
        }
        rows
    }

    #[test]
    fn test_memory_store_counts_created_and_updated() {
        let store = MemoryStore::new("code", RetryPolicy::immediate(3));
        let ctx = KeyValueContext::new().with("tenant", "acme");

        let first = store.persist(&rows(&["A", "B"]), &ctx).unwrap();
        assert_eq!(first, PersistOutcome { created: 2, updated: 0 });

        let second = store.persist(&rows(&["B", "C"]), &ctx).unwrap();
        assert_eq!(second, PersistOutcome { created: 1, updated: 1 });
        assert_eq!(store.len(), 3);
        assert_eq!(store.version(), 2);

        let other = KeyValueContext::new().with("tenant", "globex");
        let third = store.persist(&rows(&["A"]), &other).unwrap();
        assert_eq!(third.created, 1);
    }

    #[test]
    fn test_memory_store_reports_existing_keys() {
        let store = MemoryStore::new("code", RetryPolicy::immediate(1));
        let ctx = KeyValueContext::new().with("tenant", "acme");
        store.persist(&rows(&["A"]), &ctx).unwrap();

        let errors = store
            .check(&rows(&["B", "A"]), &ColumnMappings::default(), &ctx)
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row_number, 3);
        assert_eq!(errors[0].formatted_message(), "[code] 'A' already exists");
    }

    #[test]
    fn test_missing_key_message_is_not_doubled() {
        let store = MemoryStore::new("code", RetryPolicy::immediate(3));
        let ctx = KeyValueContext::new();
        let mut batch = rows(&["A"]);
        let mut record = Record::new(vec!["code".to_string(), "qty".to_string()].into());
        record.set("code", FieldValue::Null);
        batch.push(record, 7);

        let err = store.persist(&batch, &ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Persistence failed: row 7 has no value for key field 'code'"
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_closure_collaborators() {
        let handler = |rows: &ParsedRows, _: &dyn CommonData| -> Result<PersistOutcome> {
            Ok(PersistOutcome {
                created: rows.len(),
                updated: 0,
            })
        };
        let ctx = KeyValueContext::new();
        assert_eq!(handler.persist(&rows(&["A"]), &ctx).unwrap().created, 1);
    }

    #[test]
    fn test_json_lines_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        let sink = JsonLinesPersistence::new(&path);
        let ctx = KeyValueContext::new().with("tenant", "acme");

        sink.persist(&rows(&["A", "B"]), &ctx).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"row":2,"key":["acme"],"record":{"code":"A","qty":0}}"#
        );
    }
}
