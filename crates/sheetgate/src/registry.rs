//! Schema registry
//!
//! Every importable schema is registered once, together with the collaborators
//! that store its rows, and looked up by identifier for each upload.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collaborators::{ExternalUniquenessChecker, PersistenceHandler};
use crate::error::{ImportError, Result};
use crate::schema::Schema;

/// A schema with its collaborators
#[derive(Clone)]
pub struct SchemaEntry {
    pub schema: Arc<Schema>,
    pub persistence: Arc<dyn PersistenceHandler>,
    pub checker: Option<Arc<dyn ExternalUniquenessChecker>>,
}

impl std::fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("schema", &self.schema.id)
            .field("checker", &self.checker.is_some())
            .finish()
    }
}

/// Registered schemas by identifier
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Entry for a schema identifier
    pub fn get(&self, id: &str) -> Result<&SchemaEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| ImportError::UnknownSchema(id.to_string()))
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`SchemaRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<SchemaEntry>,
}

impl RegistryBuilder {
    /// Register a schema and the handler that stores its rows
    pub fn register<P>(self, schema: Schema, persistence: P) -> Self
    where
        P: PersistenceHandler + 'static,
    {
        self.push(schema, Arc::new(persistence), None)
    }

    /// Register a schema with an external uniqueness check
    pub fn register_with_checker<P, C>(self, schema: Schema, persistence: P, checker: C) -> Self
    where
        P: PersistenceHandler + 'static,
        C: ExternalUniquenessChecker + 'static,
    {
        self.push(schema, Arc::new(persistence), Some(Arc::new(checker)))
    }

    /// Register with collaborators that are already shared
    pub fn register_shared(
        self,
        schema: Schema,
        persistence: Arc<dyn PersistenceHandler>,
        checker: Option<Arc<dyn ExternalUniquenessChecker>>,
    ) -> Self {
        self.push(schema, persistence, checker)
    }

    fn push(
        mut self,
        schema: Schema,
        persistence: Arc<dyn PersistenceHandler>,
        checker: Option<Arc<dyn ExternalUniquenessChecker>>,
    ) -> Self {
        self.entries.push(SchemaEntry {
            schema: Arc::new(schema),
            persistence,
            checker,
        });
        self
    }

    /// Validate every schema and reject duplicate identifiers
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut entries = BTreeMap::new();
        for entry in self.entries {
            entry.schema.validate()?;
            let id = entry.schema.id.clone();
            if entries.insert(id.clone(), entry).is_some() {
                return Err(ImportError::InvalidSchema(format!(
                    "schema '{}' registered twice",
                    id
                )));
            }
        }
        log::debug!("schema registry built with {} schemas", entries.len());
        Ok(SchemaRegistry { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryStore, PersistOutcome};
    use crate::common::CommonData;
    use crate::record::ParsedRows;
    use crate::retry::RetryPolicy;
    use crate::schema::{FieldDef, FieldType};

    fn schema(id: &str) -> Schema {
        Schema::builder(id)
            .field(FieldDef::new("code", FieldType::String, "Code"))
            .build()
            .unwrap()
    }

    fn discard(rows: &ParsedRows, _: &dyn CommonData) -> Result<PersistOutcome> {
        Ok(PersistOutcome {
            created: rows.len(),
            updated: 0,
        })
    }

    #[test]
    fn test_lookup_by_id() {
        let store = Arc::new(MemoryStore::new("code", RetryPolicy::default()));
        let registry = SchemaRegistry::builder()
            .register(schema("products"), discard)
            .register_shared(
                schema("codes"),
                store.clone(),
                Some(store as Arc<dyn ExternalUniquenessChecker>),
            )
            .build()
            .unwrap();

        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["codes", "products"]);
        assert!(registry.get("codes").unwrap().checker.is_some());
        assert!(registry.get("products").unwrap().checker.is_none());
        assert!(matches!(registry.get("nope"), Err(ImportError::UnknownSchema(_))));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let result = SchemaRegistry::builder()
            .register(schema("products"), discard)
            .register(schema("products"), discard)
            .build();
        assert!(matches!(result, Err(ImportError::InvalidSchema(_))));
    }
}
