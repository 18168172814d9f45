//! Generic keyed store
//!
//! A `KeyedStore` binds one linked schema to a storage engine. Every
//! operation runs in its own unit of work: committed when the operation
//! succeeds, rolled back on every other exit path.

use std::sync::Arc;

use super::errors::{StoreError, StoreResult};
use super::key::{describe, Key};
use crate::codec::{encode_field, TimezoneEnforcer};
use crate::observability::{Logger, ObservationScope};
use crate::schema::{FieldDescriptor, FlatField, FlatSchema, LinkedSchema, SchemaRegistry, StructuredSchema};
use crate::storage::{Predicate, StorageEngine, UnitOfWork};
use crate::value::{FlatRecord, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Upsert,
}

/// Keyed access to the records of one schema
#[derive(Clone)]
pub struct KeyedStore {
    engine: Arc<dyn StorageEngine>,
    linked: Arc<LinkedSchema>,
}

impl KeyedStore {
    /// Binds the schema `name` of `registry` to `engine`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NotLinked` if the schema was never linked.
    pub fn new(engine: Arc<dyn StorageEngine>, registry: &SchemaRegistry, name: &str) -> StoreResult<Self> {
        let linked = registry.get(name)?;
        Ok(Self::from_linked(engine, linked))
    }

    pub fn from_linked(engine: Arc<dyn StorageEngine>, linked: Arc<LinkedSchema>) -> Self {
        Self { engine, linked }
    }

    pub fn table_name(&self) -> &str {
        self.linked.flat().table_name()
    }

    pub fn schema(&self) -> &StructuredSchema {
        self.linked.structured()
    }

    pub fn flat_schema(&self) -> &FlatSchema {
        self.linked.flat()
    }

    pub fn key_fields(&self) -> Vec<&FieldDescriptor> {
        self.schema().key_fields()
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn get_all(&self) -> StoreResult<Vec<Record>> {
        self.get_by_dict(std::iter::empty::<(String, Value)>())
    }

    /// Returns every record whose columns equal all given filter values.
    ///
    /// An empty filter returns all records. Filters on columns the schema
    /// does not have match nothing. Composite columns are compared by their
    /// encoded form; a string value is taken as already encoded.
    pub fn get_by_dict<I, K, V>(&self, filters: I) -> StoreResult<Vec<Record>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let predicates = self.filter_predicates(filters)?;
        let rows = self.with_unit(|unit, flat| Ok(unit.select(flat, &predicates)?))?;
        Logger::trace(
            "RECORDS_FETCHED",
            &[("rows", &rows.len().to_string()), ("table", self.table_name())],
        );
        self.rehydrate_rows(rows)
    }

    /// Returns the record identified by `key`.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound`: no record has this key
    /// - `DuplicateKeyMatch`: more than one record has this key
    /// - key resolution errors, see [`Key::resolve`]
    pub fn get_by_key(&self, key: impl Into<Key>) -> StoreResult<Record> {
        let predicates = self.key_predicates(key.into())?;
        let mut rows = self.with_unit(|unit, flat| Ok(unit.select(flat, &predicates)?))?;
        match rows.len() {
            0 => Err(self.not_found(&predicates)),
            1 => {
                let row = rows.remove(0);
                Ok(self.linked.rehydrate(&row)?)
            }
            count => Err(StoreError::DuplicateKeyMatch {
                table: self.table_name().to_string(),
                key: describe(&predicates),
                count,
            }),
        }
    }

    /// Looks keys up one by one; the first failure aborts the rest.
    pub fn get_by_keys_list<I, K>(&self, keys: I) -> StoreResult<Vec<Record>>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        keys.into_iter().map(|key| self.get_by_key(key)).collect()
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Inserts a record. A colliding key fails with an integrity error.
    pub fn add(&self, record: &Record) -> StoreResult<()> {
        self.write_one(WriteMode::Insert, record)
    }

    /// Inserts all records in one unit of work; nothing persists if any
    /// insert fails.
    pub fn add_list(&self, records: &[Record]) -> StoreResult<()> {
        self.write_batch("ADD_LIST", WriteMode::Insert, records)
    }

    /// Inserts a record or replaces the stored record with the same key.
    pub fn upsert(&self, record: &Record) -> StoreResult<()> {
        self.write_one(WriteMode::Upsert, record)
    }

    pub fn upsert_list(&self, records: &[Record]) -> StoreResult<()> {
        self.write_batch("UPSERT_LIST", WriteMode::Upsert, records)
    }

    // ---------------------------------------------------------------
    // Deletes
    // ---------------------------------------------------------------

    /// Deletes every record matching the filters and returns the count.
    pub fn delete_by_dict<I, K, V>(&self, filters: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let predicates = self.filter_predicates(filters)?;
        self.delete_matching(&predicates)
    }

    pub fn delete_all(&self) -> StoreResult<usize> {
        self.delete_by_dict(std::iter::empty::<(String, Value)>())
    }

    /// Deletes the stored record that `record` identifies.
    ///
    /// With key fields the record is deleted by key, so non-key fields may
    /// differ from what is stored. Without key fields every column must
    /// match.
    pub fn delete_record(&self, record: &Record) -> StoreResult<usize> {
        self.check_record_type(record)?;
        if !self.key_fields().is_empty() {
            return self.delete_by_key(record);
        }
        let row = self.linked.flatten(record)?;
        let predicates: Vec<Predicate> = row
            .into_columns()
            .into_iter()
            .map(|(column, value)| Predicate { column, value })
            .collect();
        self.delete_matching(&predicates)
    }

    /// Deletes the record identified by `key`.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if no record has this key; nothing is deleted if the
    /// key unexpectedly matches several records.
    pub fn delete_by_key(&self, key: impl Into<Key>) -> StoreResult<usize> {
        let predicates = self.key_predicates(key.into())?;
        let deleted = self.with_unit(|unit, flat| {
            let deleted = unit.delete(flat, &predicates)?;
            match deleted {
                0 => Err(self.not_found(&predicates)),
                1 => Ok(deleted),
                count => Err(StoreError::DuplicateKeyMatch {
                    table: self.table_name().to_string(),
                    key: describe(&predicates),
                    count,
                }),
            }
        })?;
        Logger::trace("RECORD_DELETED", &[("key", &describe(&predicates)), ("table", self.table_name())]);
        Ok(deleted)
    }

    /// Deletes keys one by one; the first failure aborts the rest.
    pub fn delete_by_keys_list<I, K>(&self, keys: I) -> StoreResult<usize>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        keys.into_iter().try_fold(0, |total, key| Ok(total + self.delete_by_key(key)?))
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    /// Runs `op` in a fresh unit of work, committing only on success.
    fn with_unit<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn UnitOfWork, &FlatSchema) -> StoreResult<T>,
    {
        let mut unit = self.engine.begin()?;
        let result = op(&mut *unit, self.linked.flat())?;
        unit.commit()?;
        Ok(result)
    }

    fn check_record_type(&self, record: &Record) -> StoreResult<()> {
        if record.schema_name() != self.schema().name() {
            return Err(StoreError::WrongRecordType {
                expected: self.schema().name().to_string(),
                actual: record.schema_name().to_string(),
            });
        }
        Ok(())
    }

    fn flatten_all(&self, records: &[Record]) -> StoreResult<Vec<FlatRecord>> {
        records
            .iter()
            .map(|record| -> StoreResult<FlatRecord> {
                self.check_record_type(record)?;
                Ok(self.linked.flatten(record)?)
            })
            .collect()
    }

    fn write_one(&self, mode: WriteMode, record: &Record) -> StoreResult<()> {
        self.check_record_type(record)?;
        let row = self.linked.flatten(record)?;
        self.with_unit(|unit, flat| Ok(write(unit, flat, mode, row)?))?;
        let event = match mode {
            WriteMode::Insert => "RECORD_ADDED",
            WriteMode::Upsert => "RECORD_UPSERTED",
        };
        Logger::trace(event, &[("table", self.table_name())]);
        Ok(())
    }

    fn write_batch(&self, scope_name: &str, mode: WriteMode, records: &[Record]) -> StoreResult<()> {
        let scope = ObservationScope::with_fields(scope_name, &[("table", self.table_name())]);
        let result = self.flatten_all(records).and_then(|rows| {
            let count = rows.len();
            self.with_unit(|unit, flat| {
                for row in rows {
                    write(unit, flat, mode, row)?;
                }
                Ok(count)
            })
        });
        match result {
            Ok(count) => {
                scope.complete_with_fields(&[("rows", &count.to_string())]);
                Ok(())
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn delete_matching(&self, predicates: &[Predicate]) -> StoreResult<usize> {
        let deleted = self.with_unit(|unit, flat| Ok(unit.delete(flat, predicates)?))?;
        Logger::trace(
            "RECORDS_DELETED",
            &[("rows", &deleted.to_string()), ("table", self.table_name())],
        );
        Ok(deleted)
    }

    /// Resolves a key and brings its values into stored form.
    fn key_predicates(&self, key: Key) -> StoreResult<Vec<Predicate>> {
        key.resolve(self.schema())?
            .into_iter()
            .map(|Predicate { column, value }| -> StoreResult<Predicate> {
                let value = self.stored_value(&column, value)?;
                Ok(Predicate { column, value })
            })
            .collect()
    }

    /// Builds equality predicates from user filters, with values in the
    /// form their columns store.
    fn filter_predicates<I, K, V>(&self, filters: I) -> StoreResult<Vec<Predicate>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        filters
            .into_iter()
            .map(|(column, value)| -> StoreResult<Predicate> {
                let column = column.into();
                let value = self.stored_value(&column, value.into())?;
                Ok(Predicate { column, value })
            })
            .collect()
    }

    /// Composite columns hold their encoded form; a string is taken as
    /// already encoded. Timestamps under a fixed-timezone policy are stored
    /// without their zone.
    fn stored_value(&self, column: &str, value: Value) -> StoreResult<Value> {
        Ok(match self.flat_schema().field(column) {
            Some(FlatField::Serialized { name, source_type }) if !matches!(value, Value::Str(_)) => {
                Value::Str(encode_field(source_type, &value, name)?)
            }
            Some(field @ FlatField::Scalar { .. }) => {
                TimezoneEnforcer::canonical(column, &value, field.fixed_timezone())?
            }
            _ => value,
        })
    }

    fn rehydrate_rows(&self, rows: Vec<FlatRecord>) -> StoreResult<Vec<Record>> {
        rows.iter()
            .map(|row| -> StoreResult<Record> { Ok(self.linked.rehydrate(row)?) })
            .collect()
    }

    fn not_found(&self, predicates: &[Predicate]) -> StoreError {
        StoreError::KeyNotFound {
            table: self.table_name().to_string(),
            key: describe(predicates),
        }
    }
}

fn write(unit: &mut dyn UnitOfWork, flat: &FlatSchema, mode: WriteMode, row: FlatRecord) -> StoreResult<()> {
    match mode {
        WriteMode::Insert => unit.insert(flat, row)?,
        WriteMode::Upsert => unit.upsert(flat, row)?,
    }
    Ok(())
}
