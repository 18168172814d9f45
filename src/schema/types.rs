//! Structured schema type definitions
//!
//! Supported field types:
//! - scalars: bool, int, float, string, bytes, timestamp
//! - uuid: identifier (stored serialized, it is not a storable scalar)
//! - enumeration: string-backed or integer-backed members
//! - optional<T>: T or null
//! - union<...>: accepted only as `union<T, null>`, normalised to optional<T>
//! - list<T>, set<T>, map<K, V>: collections (map keys must be scalar)
//! - record: nested structured schema, arbitrary depth

use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::{SchemaError, SchemaResult, ValidationDetails};
use crate::value::{Record, Value};

/// Underlying representation of an enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumBacking {
    Str,
    Int,
}

/// Backing value of one enumeration member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumRepr {
    Str(String),
    Int(i64),
}

/// An enumeration declaration: ordered `(member name, backing value)` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    backing: EnumBacking,
    variants: Vec<(String, EnumRepr)>,
}

impl EnumType {
    /// Declares a string-backed enumeration
    pub fn string_backed(name: impl Into<String>, variants: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            backing: EnumBacking::Str,
            variants: variants
                .iter()
                .map(|(member, repr)| (member.to_string(), EnumRepr::Str(repr.to_string())))
                .collect(),
        }
    }

    /// Declares an integer-backed enumeration
    pub fn int_backed(name: impl Into<String>, variants: &[(&str, i64)]) -> Self {
        Self {
            name: name.into(),
            backing: EnumBacking::Int,
            variants: variants
                .iter()
                .map(|(member, repr)| (member.to_string(), EnumRepr::Int(*repr)))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backing(&self) -> EnumBacking {
        self.backing
    }

    pub fn contains(&self, member: &str) -> bool {
        self.variants.iter().any(|(name, _)| name == member)
    }

    /// Backing value of a member
    pub fn repr_of(&self, member: &str) -> Option<&EnumRepr> {
        self.variants
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, repr)| repr)
    }

    /// Member name for a backing value
    pub fn member_for(&self, repr: &EnumRepr) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, r)| r == repr)
            .map(|(name, _)| name.as_str())
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|(name, _)| name.as_str())
    }
}

/// Declared type of a structured schema field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// Only meaningful as a union alternative
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    Timestamp,
    Uuid,
    Enum(Arc<EnumType>),
    Optional(Box<FieldType>),
    Union(Vec<FieldType>),
    List(Box<FieldType>),
    Set(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
    Record(Arc<StructuredSchema>),
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn list(element: FieldType) -> Self {
        FieldType::List(Box::new(element))
    }

    pub fn set(element: FieldType) -> Self {
        FieldType::Set(Box::new(element))
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        FieldType::Map(Box::new(key), Box::new(value))
    }

    pub fn enumeration(enum_type: EnumType) -> Self {
        FieldType::Enum(Arc::new(enum_type))
    }

    pub fn record(schema: StructuredSchema) -> Self {
        FieldType::Record(Arc::new(schema))
    }

    pub fn union(alternatives: Vec<FieldType>) -> Self {
        FieldType::Union(alternatives)
    }

    /// Returns the type description for error messages
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Null => "null".into(),
            FieldType::Bool => "bool".into(),
            FieldType::Int => "int".into(),
            FieldType::Float => "float".into(),
            FieldType::Str => "string".into(),
            FieldType::Bytes => "bytes".into(),
            FieldType::Timestamp => "timestamp".into(),
            FieldType::Uuid => "uuid".into(),
            FieldType::Enum(e) => format!("enum<{}>", e.name()),
            FieldType::Optional(inner) => format!("optional<{}>", inner.type_name()),
            FieldType::Union(alts) => {
                let names: Vec<String> = alts.iter().map(FieldType::type_name).collect();
                format!("union<{}>", names.join(", "))
            }
            FieldType::List(inner) => format!("list<{}>", inner.type_name()),
            FieldType::Set(inner) => format!("set<{}>", inner.type_name()),
            FieldType::Map(k, v) => format!("map<{}, {}>", k.type_name(), v.type_name()),
            FieldType::Record(schema) => format!("record<{}>", schema.name()),
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, FieldType::Optional(_))
    }

    /// Strips any optional wrappers
    pub fn non_null(&self) -> &FieldType {
        match self {
            FieldType::Optional(inner) => inner.non_null(),
            other => other,
        }
    }

    /// Whether values of this type have a scalar text form usable as map keys
    pub fn is_key_capable(&self) -> bool {
        matches!(
            self,
            FieldType::Bool
                | FieldType::Int
                | FieldType::Float
                | FieldType::Str
                | FieldType::Bytes
                | FieldType::Timestamp
                | FieldType::Uuid
                | FieldType::Enum(_)
        )
    }

    /// Normalises unions and validates map keys, recursively.
    ///
    /// `union<T, null>` becomes `optional<T>`; a union with more than one
    /// non-null alternative is rejected.
    pub fn normalize(&self, field: &str) -> SchemaResult<FieldType> {
        match self {
            FieldType::Union(alternatives) => {
                let has_null = alternatives.iter().any(|t| *t == FieldType::Null);
                let concrete: Vec<&FieldType> =
                    alternatives.iter().filter(|t| **t != FieldType::Null).collect();

                match concrete.as_slice() {
                    [] => Ok(FieldType::Null),
                    [single] if has_null => Ok(FieldType::optional(single.normalize(field)?.non_null().clone())),
                    [single] => single.normalize(field),
                    _ => Err(SchemaError::MultiTypeUnion {
                        field: field.to_string(),
                        alternatives: self.type_name(),
                    }),
                }
            }
            FieldType::Optional(inner) => {
                Ok(FieldType::optional(inner.normalize(field)?.non_null().clone()))
            }
            FieldType::List(inner) => Ok(FieldType::list(inner.normalize(field)?)),
            FieldType::Set(inner) => Ok(FieldType::set(inner.normalize(field)?)),
            FieldType::Map(key, value) => {
                let key = key.normalize(field)?;
                if !key.is_key_capable() {
                    return Err(SchemaError::UnsupportedMapKey {
                        field: field.to_string(),
                        key_type: key.type_name(),
                    });
                }
                Ok(FieldType::map(key, value.normalize(field)?))
            }
            other => Ok(other.clone()),
        }
    }

    /// Checks that `value` conforms to this type. No coercion is applied.
    pub fn check_value(&self, value: &Value, path: &str) -> Result<(), ValidationDetails> {
        let mismatch = || ValidationDetails::type_mismatch(path, self.type_name(), value.type_name());

        match (self, value) {
            (FieldType::Null, Value::Null) => Ok(()),
            (FieldType::Optional(_), Value::Null) => Ok(()),
            (FieldType::Optional(inner), _) => inner.check_value(value, path),
            (FieldType::Union(alts), _) => {
                if alts.iter().any(|t| t.check_value(value, path).is_ok()) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (FieldType::Bool, Value::Bool(_))
            | (FieldType::Int, Value::Int(_))
            | (FieldType::Float, Value::Float(_))
            | (FieldType::Str, Value::Str(_))
            | (FieldType::Bytes, Value::Bytes(_))
            | (FieldType::Timestamp, Value::Timestamp(_))
            | (FieldType::Uuid, Value::Uuid(_)) => Ok(()),
            (FieldType::Enum(e), Value::Enum(member)) => {
                if e.contains(member) {
                    Ok(())
                } else {
                    Err(ValidationDetails::new(
                        path,
                        format!("member of {}", e.name()),
                        format!("'{}'", member),
                    ))
                }
            }
            (FieldType::List(inner), Value::List(items)) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| inner.check_value(item, &format!("{}[{}]", path, i))),
            (FieldType::Set(inner), Value::Set(items)) => items
                .iter()
                .try_for_each(|item| inner.check_value(item, &format!("{}[]", path))),
            (FieldType::Map(key_type, value_type), Value::Map(entries)) => {
                entries.iter().try_for_each(|(k, v)| {
                    key_type.check_value(k, &format!("{}{{key}}", path))?;
                    value_type.check_value(v, &format!("{}[{:?}]", path, k))
                })
            }
            (FieldType::Record(schema), Value::Record(record)) => schema.check_fields(record, path),
            _ => Err(mismatch()),
        }
    }
}

/// Field definition of a structured schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Value used when a record omits the field; `None` makes it required
    pub default: Option<Value>,
    /// Whether the field is part of the record key
    pub primary_key: bool,
}

impl FieldDescriptor {
    /// Creates a required, non-key field
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
            primary_key: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn as_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Whether a record may omit the field
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A structured schema: an ordered list of field descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl StructuredSchema {
    pub fn builder(name: impl Into<String>) -> StructuredSchemaBuilder {
        StructuredSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields marked as primary key, in declaration order
    pub fn key_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    /// Instantiates a record, filling defaults for omitted fields.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidRecord` if a value has the wrong type,
    /// a field without default is omitted, or an undeclared field is given.
    pub fn record<I, K, V>(&self, values: I) -> SchemaResult<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut provided: BTreeMap<String, Value> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some(extra) = provided.keys().find(|k| self.field(k).is_none()) {
            return Err(SchemaError::invalid_record(
                &self.name,
                ValidationDetails::extra_field(extra.as_str()),
            ));
        }

        let mut fields = BTreeMap::new();
        for descriptor in &self.fields {
            let value = match provided.remove(&descriptor.name) {
                Some(value) => value,
                None => descriptor.default.clone().ok_or_else(|| {
                    SchemaError::invalid_record(
                        &self.name,
                        ValidationDetails::missing_field(descriptor.name.as_str()),
                    )
                })?,
            };
            fields.insert(descriptor.name.clone(), value);
        }

        let record = Record::new_unchecked(&self.name, fields);
        self.check_record(&record)?;
        Ok(record)
    }

    /// Instantiates a record from defaults only
    pub fn default_record(&self) -> SchemaResult<Record> {
        self.record(std::iter::empty::<(String, Value)>())
    }

    /// Validates that a record belongs to this schema and conforms to it
    pub fn check_record(&self, record: &Record) -> SchemaResult<()> {
        self.check_fields(record, "")
            .map_err(|details| SchemaError::invalid_record(&self.name, details))
    }

    fn check_fields(&self, record: &Record, path: &str) -> Result<(), ValidationDetails> {
        let at = |field: &str| {
            if path.is_empty() {
                field.to_string()
            } else {
                format!("{}.{}", path, field)
            }
        };

        if record.schema_name() != self.name {
            return Err(ValidationDetails::type_mismatch(
                if path.is_empty() { "$record" } else { path },
                format!("record<{}>", self.name),
                format!("record<{}>", record.schema_name()),
            ));
        }

        for (name, _) in record.fields() {
            if self.field(name).is_none() {
                return Err(ValidationDetails::extra_field(at(name)));
            }
        }

        for descriptor in &self.fields {
            let field_path = at(&descriptor.name);
            match record.get(&descriptor.name) {
                Some(value) => descriptor.field_type.check_value(value, &field_path)?,
                None => return Err(ValidationDetails::missing_field(field_path)),
            }
        }

        Ok(())
    }
}

/// Builder producing an immutable, validated `StructuredSchema`
#[derive(Debug, Clone)]
pub struct StructuredSchemaBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl StructuredSchemaBuilder {
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Validates the declaration and produces the schema.
    ///
    /// # Errors
    ///
    /// - `MultiTypeUnion`: union with more than one non-null alternative
    /// - `UnsupportedMapKey`: map keyed by a non-scalar type
    /// - `DuplicateField`: field name declared twice
    /// - `InvalidDefault`: default value does not match the field type
    pub fn build(self) -> SchemaResult<StructuredSchema> {
        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(self.fields.len());

        for mut descriptor in self.fields {
            if fields.iter().any(|f| f.name == descriptor.name) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name.clone(),
                    field: descriptor.name,
                });
            }

            descriptor.field_type = descriptor.field_type.normalize(&descriptor.name)?;

            if let Some(default) = &descriptor.default {
                descriptor
                    .field_type
                    .check_value(default, &descriptor.name)
                    .map_err(|details| SchemaError::InvalidDefault {
                        schema: self.name.clone(),
                        details,
                    })?;
            }

            fields.push(descriptor);
        }

        Ok(StructuredSchema {
            name: self.name,
            fields,
        })
    }
}
