//! flatstore - persist nested structured records in flat scalar storage
//!
//! A structured schema may nest records, lists, sets, maps and enums. Linking
//! it derives a flat schema whose columns are all storable scalars; composite
//! fields travel as self-describing JSON text. A keyed store then offers CRUD
//! over any storage engine that implements the unit-of-work contract.
//!
//! ```ignore
//! use std::sync::Arc;
//! use flatstore::{FieldDescriptor, FieldType, KeyedStore, LinkOptions, MemoryEngine,
//!                 SchemaRegistry, StorageEngine, StructuredSchema, Value};
//!
//! let schema = StructuredSchema::builder("Model")
//!     .field(FieldDescriptor::new("index", FieldType::optional(FieldType::Int))
//!         .with_default(Value::Null)
//!         .as_primary_key())
//!     .field(FieldDescriptor::new("desc", FieldType::optional(FieldType::Str))
//!         .with_default(Value::Null))
//!     .build()?;
//!
//! let mut registry = SchemaRegistry::new();
//! registry.link(schema, LinkOptions::new())?;
//! let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
//! flatstore::storage::create_tables(engine.as_ref(), &registry)?;
//!
//! let store = KeyedStore::new(engine, &registry, "Model")?;
//! store.add(&store.schema().record([("desc", "11")])?)?;
//! let first = store.get_by_key(1_i64)?;
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod schema;
pub mod storage;
pub mod store;
pub mod value;

pub use codec::{flatten, rehydrate, CodecError};
pub use error::{ErrorKind, Severity};
pub use schema::{
    generate_flat_schema, EnumType, FieldDescriptor, FieldType, FlatSchema, LinkOptions, LinkedSchema,
    SchemaError, SchemaRegistry, StructuredSchema,
};
pub use storage::{MemoryEngine, SqliteConfig, SqliteEngine, StorageEngine, StorageError};
pub use store::{Key, KeyedStore, StoreError, StoreResult};
pub use value::{FlatRecord, Record, Timestamp, Value};
