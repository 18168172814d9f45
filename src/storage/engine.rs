//! Storage engine contract
//!
//! An engine owns one table per flat schema. All reads and writes happen
//! inside a unit of work; dropping a unit of work without committing it
//! rolls back every change it made.

use super::errors::StorageResult;
use crate::observability::Logger;
use crate::schema::{FieldType, FlatSchema, SchemaRegistry};
use crate::value::{FlatRecord, Value};

/// Column equality condition; a filter is a conjunction of predicates
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub value: Value,
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// A predicate on a column the row lacks never matches
    pub fn matches(&self, row: &FlatRecord) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

/// Returns true when every predicate names a column of the schema.
///
/// Filters that name unknown columns match no rows.
pub fn filters_apply(schema: &FlatSchema, filters: &[Predicate]) -> bool {
    filters.iter().all(|p| schema.field(&p.column).is_some())
}

/// A storage backend holding flat tables
pub trait StorageEngine: Send + Sync {
    /// Creates the table of `schema` if it does not exist yet
    fn create_table(&self, schema: &FlatSchema) -> StorageResult<()>;

    /// Opens a unit of work. Units are serialised by the engine.
    fn begin(&self) -> StorageResult<Box<dyn UnitOfWork + '_>>;

    /// Short engine name used in logs
    fn name(&self) -> &'static str;
}

/// One transactional session against an engine.
///
/// Rows are returned in insertion order. A single integer key column that is
/// null on insert receives the next free key.
pub trait UnitOfWork {
    fn select(&mut self, schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<Vec<FlatRecord>>;

    /// Inserts a row; a colliding key is an integrity error
    fn insert(&mut self, schema: &FlatSchema, row: FlatRecord) -> StorageResult<()>;

    /// Inserts a row or replaces the row holding the same key
    fn upsert(&mut self, schema: &FlatSchema, row: FlatRecord) -> StorageResult<()>;

    /// Deletes matching rows and returns how many were removed
    fn delete(&mut self, schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<usize>;

    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// Creates the table of every schema linked in `registry`
pub fn create_tables(engine: &dyn StorageEngine, registry: &SchemaRegistry) -> StorageResult<()> {
    for linked in registry.all_schemas() {
        engine.create_table(linked.flat())?;
        Logger::info(
            "TABLE_CREATED",
            &[("engine", engine.name()), ("table", linked.flat().table_name())],
        );
    }
    Ok(())
}

/// Returns the integer key column that the engine assigns on insert, if any
pub(crate) fn auto_key_column(schema: &FlatSchema) -> Option<&str> {
    let mut keys = schema.key_columns().into_iter();
    match (keys.next(), keys.next()) {
        (Some(only), None) if matches!(only.column_type().non_null(), FieldType::Int) => Some(only.name()),
        _ => None,
    }
}
