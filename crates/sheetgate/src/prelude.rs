//! Common imports for sheetgate users
//!
//! ```rust
//! use sheetgate::prelude::*;
//! ```

pub use crate::{
    CommonData,
    FieldDef,
    FieldType,
    ImportError,
    ImportOptions,
    ImportRequest,
    ImportResult,
    Importer,
    JsonLinesPersistence,
    KeyValueContext,
    MatchMode,
    MemoryStore,
    PersistOutcome,
    PersistenceHandler,
    Result,
    Schema,
    SchemaRegistry,
};
