//! Schema registry: the explicit linking step
//!
//! A structured schema is linked once, right after it is declared. Linking
//! generates its flat schema and stores the pair under the schema name. The
//! pair is immutable afterwards; keyed stores are built from the registry.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::errors::{SchemaError, SchemaResult};
use super::flat::{generate_flat_schema, FlatSchema};
use super::types::StructuredSchema;
use crate::codec::{self, CodecResult};
use crate::observability::Logger;
use crate::value::{FlatRecord, Record};

/// Options applied when linking a schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Table name override (defaults to the schema name)
    pub table_name: Option<String>,
    /// Fixed-timezone policy for every timestamp field
    pub fixed_timezone: Option<String>,
}

impl LinkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn fixed_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.fixed_timezone = Some(timezone.into());
        self
    }

    /// Loads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Config` if the file cannot be read or is not
    /// valid options JSON.
    pub fn from_json_file(path: &Path) -> SchemaResult<Self> {
        let config_error = |reason: String| SchemaError::Config {
            path: path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| config_error(e.to_string()))
    }
}

/// A structured schema together with its generated flat schema
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedSchema {
    structured: Arc<StructuredSchema>,
    flat: FlatSchema,
}

impl LinkedSchema {
    /// Links a schema without registering it
    pub fn new(schema: StructuredSchema, options: &LinkOptions) -> SchemaResult<Self> {
        let mut flat = generate_flat_schema(&schema, options.fixed_timezone.as_deref())?;
        if let Some(table_name) = &options.table_name {
            flat = flat.with_table_name(table_name.as_str());
        }
        Ok(Self {
            structured: Arc::new(schema),
            flat,
        })
    }

    pub fn name(&self) -> &str {
        self.structured.name()
    }

    pub fn structured(&self) -> &StructuredSchema {
        &self.structured
    }

    pub fn flat(&self) -> &FlatSchema {
        &self.flat
    }

    /// Structured record → flat record
    pub fn flatten(&self, record: &Record) -> CodecResult<FlatRecord> {
        codec::flatten(record, &self.flat)
    }

    /// Flat record → structured record
    pub fn rehydrate(&self, flat_record: &FlatRecord) -> CodecResult<Record> {
        codec::rehydrate(flat_record, &self.flat, &self.structured)
    }
}

/// Registry of linked schemas, keyed by schema name
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<LinkedSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the flat schema of `schema` and registers the pair.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::AlreadyLinked` if a schema of the same name is
    /// registered, or any flat schema generation error.
    pub fn link(&mut self, schema: StructuredSchema, options: LinkOptions) -> SchemaResult<Arc<LinkedSchema>> {
        if self.schemas.contains_key(schema.name()) {
            return Err(SchemaError::AlreadyLinked {
                schema: schema.name().to_string(),
            });
        }

        let linked = Arc::new(LinkedSchema::new(schema, &options)?);
        Logger::trace(
            "SCHEMA_LINKED",
            &[
                ("schema", linked.name()),
                ("flat_schema", linked.flat().name()),
                ("table", linked.flat().table_name()),
            ],
        );
        self.schemas.insert(linked.name().to_string(), Arc::clone(&linked));
        Ok(linked)
    }

    /// Returns a linked schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::NotLinked` when the schema was never linked.
    pub fn get(&self, name: &str) -> SchemaResult<Arc<LinkedSchema>> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::NotLinked {
                schema: name.to_string(),
            })
    }

    pub fn is_linked(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn all_schemas(&self) -> impl Iterator<Item = &Arc<LinkedSchema>> {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
