//! SQLite storage engine
//!
//! One table per flat schema, columns in schema order. A single integer key
//! column becomes `INTEGER PRIMARY KEY` so SQLite assigns it when null.
//! Column mapping:
//! - bool, int → INTEGER
//! - float → REAL
//! - bytes → BLOB
//! - str, enum (variant name), timestamp (wall clock, zone dropped) → TEXT
//!
//! Units of work are `BEGIN` / `COMMIT` pairs on the shared connection; a
//! unit dropped before commit issues `ROLLBACK`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

use super::config::SqliteConfig;
use super::engine::{auto_key_column, filters_apply, Predicate, StorageEngine, UnitOfWork};
use super::errors::{StorageError, StorageResult};
use crate::observability::Logger;
use crate::schema::{FieldType, FlatField, FlatSchema};
use crate::value::{FlatRecord, Timestamp, Value};

/// Storage engine backed by one SQLite connection
pub struct SqliteEngine {
    conn: Mutex<Connection>,
}

impl SqliteEngine {
    pub fn open(config: &SqliteConfig) -> StorageResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        let location = config
            .path
            .as_ref()
            .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string());
        Logger::info("SQLITE_OPENED", &[("path", &location)]);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open(&SqliteConfig::in_memory())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl StorageEngine for SqliteEngine {
    fn create_table(&self, schema: &FlatSchema) -> StorageResult<()> {
        let table = schema.table_name();
        let auto_key = auto_key_column(schema);

        let mut definitions: Vec<String> = schema
            .fields()
            .iter()
            .map(|field| {
                let mut definition = format!("{} {}", quote_ident(field.name()), sql_type(field));
                if auto_key == Some(field.name()) {
                    definition.push_str(" PRIMARY KEY");
                } else if !field.is_nullable() {
                    definition.push_str(" NOT NULL");
                }
                definition
            })
            .collect();

        let keys = schema.key_columns();
        if auto_key.is_none() && !keys.is_empty() {
            let key_list: Vec<String> = keys.iter().map(|f| quote_ident(f.name())).collect();
            definitions.push(format!("PRIMARY KEY ({})", key_list.join(", ")));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            definitions.join(", ")
        );
        self.lock()?
            .execute_batch(&sql)
            .map_err(|e| StorageError::from_sqlite(table, e))
    }

    fn begin(&self) -> StorageResult<Box<dyn UnitOfWork + '_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN")?;
        Ok(Box::new(SqliteUnit { conn, finished: false }))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

struct SqliteUnit<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteUnit<'_> {
    fn write(&mut self, verb: &str, schema: &FlatSchema, row: &FlatRecord) -> StorageResult<()> {
        let table = schema.table_name();
        let mut columns = Vec::with_capacity(schema.fields().len());
        let mut params = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let value = row.get(field.name()).unwrap_or(&Value::Null);
            columns.push(quote_ident(field.name()));
            params.push(to_sql(field.name(), value)?);
        }
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let sql = format!(
            "{} INTO {} ({}) VALUES ({})",
            verb,
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(|e| StorageError::from_sqlite(table, e))?;
        Ok(())
    }
}

impl UnitOfWork for SqliteUnit<'_> {
    fn select(&mut self, schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<Vec<FlatRecord>> {
        if !filters_apply(schema, filters) {
            return Ok(Vec::new());
        }
        let table = schema.table_name();
        let (condition, params) = where_clause(schema, filters)?;
        let columns: Vec<String> = schema.column_names().map(quote_ident).collect();
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            columns.join(", "),
            quote_ident(table),
            condition
        );

        let width = columns.len();
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StorageError::from_sqlite(table, e))?;
        let raw_rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(SqlValue::from))
                    .collect::<rusqlite::Result<Vec<SqlValue>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw_rows
            .into_iter()
            .map(|values| {
                schema
                    .fields()
                    .iter()
                    .zip(values)
                    .map(|(field, value)| -> StorageResult<(String, Value)> {
                        Ok((field.name().to_string(), from_sql(field, value)?))
                    })
                    .collect::<StorageResult<FlatRecord>>()
            })
            .collect()
    }

    fn insert(&mut self, schema: &FlatSchema, row: FlatRecord) -> StorageResult<()> {
        self.write("INSERT", schema, &row)
    }

    fn upsert(&mut self, schema: &FlatSchema, row: FlatRecord) -> StorageResult<()> {
        self.write("INSERT OR REPLACE", schema, &row)
    }

    fn delete(&mut self, schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<usize> {
        if !filters_apply(schema, filters) {
            return Ok(0);
        }
        let table = schema.table_name();
        let (condition, params) = where_clause(schema, filters)?;
        let sql = format!("DELETE FROM {}{}", quote_ident(table), condition);
        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(|e| StorageError::from_sqlite(table, e))
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteUnit<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            Logger::warn("SQLITE_ROLLBACK_FAILED", &[("reason", &e.to_string())]);
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(field: &FlatField) -> &'static str {
    match field.column_type().non_null() {
        FieldType::Bool | FieldType::Int => "INTEGER",
        FieldType::Float => "REAL",
        FieldType::Bytes => "BLOB",
        _ => "TEXT",
    }
}

/// Builds ` WHERE "a" IS ?1 AND ...`; `IS` makes null filters match nulls.
fn where_clause(schema: &FlatSchema, filters: &[Predicate]) -> StorageResult<(String, Vec<SqlValue>)> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut conditions = Vec::with_capacity(filters.len());
    let mut params = Vec::with_capacity(filters.len());
    for (i, predicate) in filters.iter().enumerate() {
        let field = schema
            .field(&predicate.column)
            .ok_or_else(|| StorageError::conversion(&predicate.column, "unknown column"))?;
        conditions.push(format!("{} IS ?{}", quote_ident(field.name()), i + 1));
        params.push(to_sql(field.name(), &predicate.value)?);
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

fn to_sql(column: &str, value: &Value) -> StorageResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) if f.is_nan() => {
            return Err(StorageError::conversion(column, "NaN cannot be stored, SQLite reads it back as NULL"))
        }
        Value::Float(f) => SqlValue::Real(*f),
        Value::Str(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.wall_clock_text()),
        Value::Enum(name) => SqlValue::Text(name.clone()),
        other => {
            return Err(StorageError::conversion(
                column,
                format!("{} is not a storable scalar", other.type_name()),
            ))
        }
    })
}

fn from_sql(field: &FlatField, value: SqlValue) -> StorageResult<Value> {
    let column = field.name();
    let column_type = field.column_type();
    Ok(match (column_type.non_null(), value) {
        (_, SqlValue::Null) => Value::Null,
        (FieldType::Bool, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (FieldType::Int, SqlValue::Integer(i)) => Value::Int(i),
        (FieldType::Float, SqlValue::Real(f)) => Value::Float(f),
        (FieldType::Float, SqlValue::Integer(i)) => Value::Float(i as f64),
        (FieldType::Str, SqlValue::Text(s)) => Value::Str(s),
        (FieldType::Bytes, SqlValue::Blob(b)) => Value::Bytes(b),
        (FieldType::Enum(_), SqlValue::Text(s)) => Value::Enum(s),
        (FieldType::Timestamp, SqlValue::Text(s)) => {
            Value::Timestamp(Timestamp::from_text(&s).map_err(|e| StorageError::conversion(column, e))?)
        }
        (expected, other) => {
            return Err(StorageError::conversion(
                column,
                format!("stored {} does not fit {}", other.data_type(), expected.type_name()),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{generate_flat_schema, EnumType, FieldDescriptor, StructuredSchema};
    use chrono::NaiveDate;

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

    fn engine() -> SqliteEngine {
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine.create_table(&schema()).unwrap();
        engine
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("index"), "\"index\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_insert_assigns_integer_key() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(None, "11")).unwrap();
        unit.insert(&schema, row(None, "22")).unwrap();
        let rows = unit.select(&schema, &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("index"), Some(&Value::Int(1)));
        assert_eq!(rows[1].get("index"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_duplicate_key_is_integrity_error() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(1), "11")).unwrap();
        let err = unit.insert(&schema, row(Some(1), "22")).unwrap_err();
        assert!(err.is_integrity(), "unexpected error: {}", err);
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
    fn test_upsert_and_delete() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, row(Some(1), "11")).unwrap();
        unit.insert(&schema, row(Some(2), "22")).unwrap();
        unit.upsert(&schema, row(Some(2), "33")).unwrap();
        unit.commit().unwrap();

        let mut unit = engine.begin().unwrap();
        let found = unit.select(&schema, &[Predicate::eq("index", 2_i64)]).unwrap();
        assert_eq!(found[0].get("desc"), Some(&Value::from("33")));
        assert_eq!(unit.delete(&schema, &[Predicate::eq("desc", "11")]).unwrap(), 1);
        assert_eq!(unit.delete(&schema, &[Predicate::eq("d", "?")]).unwrap(), 0);
        assert_eq!(unit.select(&schema, &[]).unwrap().len(), 1);
    }

    #[test]
    fn test_null_filter_matches_null() {
        let engine = engine();
        let schema = schema();

        let mut unit = engine.begin().unwrap();
        let mut empty = FlatRecord::new();
        empty.push("index", Value::Null);
        empty.push("desc", Value::Null);
        unit.insert(&schema, empty).unwrap();

        let found = unit.select(&schema, &[Predicate::eq("desc", Value::Null)]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_column_mapping() {
        let structured = StructuredSchema::builder("Typed")
            .field(FieldDescriptor::new("flag", FieldType::Bool))
            .field(FieldDescriptor::new("ratio", FieldType::Float))
            .field(FieldDescriptor::new("blob", FieldType::Bytes))
            .field(FieldDescriptor::new(
                "level",
                FieldType::enumeration(EnumType::int_backed("Level", &[("low", 1), ("high", 2)])),
            ))
            .field(FieldDescriptor::new("at", FieldType::Timestamp))
            .build()
            .unwrap();
        let schema = generate_flat_schema(&structured, None).unwrap();
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine.create_table(&schema).unwrap();

        let clock = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let mut written = FlatRecord::new();
        written.push("flag", Value::Bool(true));
        written.push("ratio", Value::Float(0.25));
        written.push("blob", Value::Bytes(vec![0, 1, 2]));
        written.push("level", Value::variant("high"));
        written.push("at", Value::Timestamp(Timestamp::zoned(clock, chrono_tz::UTC)));

        let mut unit = engine.begin().unwrap();
        unit.insert(&schema, written).unwrap();
        let read = unit.select(&schema, &[]).unwrap().remove(0);

        assert_eq!(read.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(read.get("ratio"), Some(&Value::Float(0.25)));
        assert_eq!(read.get("blob"), Some(&Value::Bytes(vec![0, 1, 2])));
        assert_eq!(read.get("level"), Some(&Value::variant("high")));
        // zone is dropped by the engine
        assert_eq!(read.get("at"), Some(&Value::Timestamp(Timestamp::naive(clock))));
    }

    #[test]
    fn test_nan_rejected_infinity_kept() {
        let structured = StructuredSchema::builder("Measure")
            .field(FieldDescriptor::new("id", FieldType::Int).as_primary_key())
            .field(FieldDescriptor::new("f", FieldType::optional(FieldType::Float)).with_default(Value::Null))
            .build()
            .unwrap();
        let schema = generate_flat_schema(&structured, None).unwrap();
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine.create_table(&schema).unwrap();

        let measure = |id: i64, f: f64| {
            let mut row = FlatRecord::new();
            row.push("id", Value::Int(id));
            row.push("f", Value::Float(f));
            row
        };

        let mut unit = engine.begin().unwrap();
        let err = unit.insert(&schema, measure(1, f64::NAN)).unwrap_err();
        assert_eq!(err.code(), "FLAT_STORAGE_CONVERSION");
        unit.insert(&schema, measure(2, f64::INFINITY)).unwrap();

        let rows = unit.select(&schema, &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("f"), Some(&Value::Float(f64::INFINITY)));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig::file(dir.path().join("records.db"));
        let schema = schema();

        {
            let engine = SqliteEngine::open(&config).unwrap();
            engine.create_table(&schema).unwrap();
            let mut unit = engine.begin().unwrap();
            unit.insert(&schema, row(Some(7), "77")).unwrap();
            unit.commit().unwrap();
        }

        let engine = SqliteEngine::open(&config).unwrap();
        engine.create_table(&schema).unwrap();
        let mut unit = engine.begin().unwrap();
        assert_eq!(unit.select(&schema, &[]).unwrap().len(), 1);
    }
}
