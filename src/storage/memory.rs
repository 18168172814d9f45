//! In-memory storage engine
//!
//! Tables are vectors of flat records kept behind one mutex. A unit of work
//! holds the lock for its whole lifetime and writes into private copies of
//! the tables it touches; commit publishes the copies, drop discards them.
//! Values, including timestamp zones, are kept exactly as written.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::engine::{auto_key_column, filters_apply, Predicate, StorageEngine, UnitOfWork};
use super::errors::{StorageError, StorageResult};
use crate::schema::FlatSchema;
use crate::value::{FlatRecord, Value};

type Tables = HashMap<String, Vec<FlatRecord>>;

/// Storage engine keeping every table in process memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: Mutex<Tables>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl StorageEngine for MemoryEngine {
    fn create_table(&self, schema: &FlatSchema) -> StorageResult<()> {
        self.lock()?.entry(schema.table_name().to_string()).or_default();
        Ok(())
    }

    fn begin(&self) -> StorageResult<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(MemoryUnit {
            committed: self.lock()?,
            working: Tables::new(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryUnit<'a> {
    committed: MutexGuard<'a, Tables>,
    working: Tables,
}

impl MemoryUnit<'_> {
    fn rows(&self, table: &str) -> StorageResult<&Vec<FlatRecord>> {
        self.working
            .get(table)
            .or_else(|| self.committed.get(table))
            .ok_or_else(|| StorageError::UnknownTable {
                table: table.to_string(),
            })
    }

    fn rows_mut(&mut self, table: &str) -> StorageResult<&mut Vec<FlatRecord>> {
        if !self.working.contains_key(table) {
            let copy = self
                .committed
                .get(table)
                .cloned()
                .ok_or_else(|| StorageError::UnknownTable {
                    table: table.to_string(),
                })?;
            self.working.insert(table.to_string(), copy);
        }
        self.working.get_mut(table).ok_or_else(|| StorageError::UnknownTable {
            table: table.to_string(),
        })
    }

    /// Fills a null auto-assigned key with the next free value
    fn assign_key(schema: &FlatSchema, rows: &[FlatRecord], row: &mut FlatRecord) -> StorageResult<()> {
        let Some(column) = auto_key_column(schema) else {
            return Ok(());
        };
        if row.get(column).map_or(true, Value::is_null) {
            let next = rows
                .iter()
                .filter_map(|r| r.get(column).and_then(Value::as_int))
                .max()
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| StorageError::KeyExhausted {
                    table: schema.table_name().to_string(),
                    column: column.to_string(),
                })?;
            row.push(column, Value::Int(next));
        }
        Ok(())
    }

    fn position_of(schema: &FlatSchema, rows: &[FlatRecord], row: &FlatRecord) -> Option<usize> {
        if schema.key_columns().is_empty() {
            return None;
        }
        let key = key_of(schema, row);
        rows.iter().position(|r| key_of(schema, r) == key)
    }
}

fn key_of(schema: &FlatSchema, row: &FlatRecord) -> Vec<Value> {
    schema
        .key_columns()
        .iter()
        .map(|f| row.get(f.name()).cloned().unwrap_or(Value::Null))
        .collect()
}

fn matches_all(filters: &[Predicate], row: &FlatRecord) -> bool {
    filters.iter().all(|p| p.matches(row))
}

impl UnitOfWork for MemoryUnit<'_> {
    fn select(&mut self, schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<Vec<FlatRecord>> {
        let rows = self.rows(schema.table_name())?;
        if !filters_apply(schema, filters) {
            return Ok(Vec::new());
        }
        Ok(rows.iter().filter(|r| matches_all(filters, r)).cloned().collect())
    }

    fn insert(&mut self, schema: &FlatSchema, mut row: FlatRecord) -> StorageResult<()> {
        let table = schema.table_name();
        let rows = self.rows_mut(table)?;
        Self::assign_key(schema, rows, &mut row)?;
        if Self::position_of(schema, rows, &row).is_some() {
            let key: Vec<String> = key_of(schema, &row).iter().map(|v| format!("{:?}", v)).collect();
            return Err(StorageError::integrity(
                table,
                format!("duplicate primary key ({})", key.join(", ")),
            ));
        }
        rows.push(row);
        Ok(())
    }

    fn upsert(&mut self, schema: &FlatSchema, mut row: FlatRecord) -> StorageResult<()> {
        let rows = self.rows_mut(schema.table_name())?;
        Self::assign_key(schema, rows, &mut row)?;
        match Self::position_of(schema, rows, &row) {
            Some(index) => rows[index] = row,
            None => rows.push(row),
        }
        Ok(())
    }

    fn delete(&mut self, schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<usize> {
        let rows = self.rows_mut(schema.table_name())?;
        if !filters_apply(schema, filters) {
            return Ok(0);
        }
        let before = rows.len();
        rows.retain(|r| !matches_all(filters, r));
        Ok(before - rows.len())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let MemoryUnit { mut committed, working } = *self;
        committed.extend(working);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{generate_flat_schema, FieldDescriptor, FieldType, StructuredSchema};

    fn schema() -> FlatSchema {
        let schema = StructuredSchema::builder("Model")
            .field(
                FieldDescriptor::new("index", FieldType::optional(FieldType::Int))
                    .with_default(Value::Null)
                    .as_primary_key(),
            )
            .field(FieldDescriptor::new("desc", FieldType::optional(FieldType::Str)).with_default(Value::Null))
            .build()
            .unwrap();
        generate_flat_schema(&schema, None).unwrap()
    }

    fn row(index: Option<i64>, desc: &str) -> FlatRecord {
        let mut row = FlatRecord::new();
        row.push("index", Value::from(index));
        row.push("desc", Value::from(desc));
        row
    }

    fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.create_table(&schema()).unwrap();
        engine
    }

    #[test]
    fn test_insert_assigns_key() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(None, "11")).unwrap();
        unit.insert(&schema, row(None, "22")).unwrap();
        let rows = unit.select(&schema, &[]).unwrap();
        assert_eq!(rows[0].get("index"), Some(&Value::Int(1)));
        assert_eq!(rows[1].get("index"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_exhausted_key_space_is_an_error() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(i64::MAX), "max")).unwrap();
        let err = unit.insert(&schema, row(None, "next")).unwrap_err();
        assert_eq!(err.code(), "FLAT_STORAGE_KEY_EXHAUSTED");
        assert!(unit.upsert(&schema, row(None, "next")).is_err());
        unit.commit().unwrap();

        let mut unit = engine.begin().unwrap();
        assert_eq!(unit.select(&schema, &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_key_is_integrity_error() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(1), "11")).unwrap();
        let err = unit.insert(&schema, row(Some(1), "22")).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let engine = engine();
        let schema = schema();

        {
            let mut unit = engine.begin().unwrap();
            unit.insert(&schema, row(Some(1), "11")).unwrap();
        }

        let mut unit = engine.begin().unwrap();
        assert!(unit.select(&schema, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_commit_publishes_changes() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(1), "11")).unwrap();
        unit.commit().unwrap();

        let mut unit = engine.begin().unwrap();
        assert_eq!(unit.select(&schema, &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(1), "11")).unwrap();
        unit.insert(&schema, row(Some(2), "22")).unwrap();
        unit.upsert(&schema, row(Some(1), "33")).unwrap();
        unit.upsert(&schema, row(Some(4), "44")).unwrap();

        let rows = unit.select(&schema, &[]).unwrap();
        let descs: Vec<&Value> = rows.iter().filter_map(|r| r.get("desc")).collect();
        assert_eq!(descs, vec![&Value::from("33"), &Value::from("22"), &Value::from("44")]);
    }

    #[test]
    fn test_filtered_select_and_delete() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(1), "11")).unwrap();
        unit.insert(&schema, row(Some(2), "22")).unwrap();

        let found = unit.select(&schema, &[Predicate::eq("desc", "22")]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(unit.select(&schema, &[Predicate::eq("d", "?")]).unwrap().is_empty());

        assert_eq!(unit.delete(&schema, &[Predicate::eq("desc", "22")]).unwrap(), 1);
        assert_eq!(unit.delete(&schema, &[]).unwrap(), 1);
        assert!(unit.select(&schema, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_table() {
        let engine = MemoryEngine::new();
        let mut unit = engine.begin().unwrap();
        let err = unit.select(&schema(), &[]).unwrap_err();
        assert_eq!(err.code(), "FLAT_STORAGE_UNKNOWN_TABLE");
    }
}
