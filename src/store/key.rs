//! Key resolution
//!
//! A key is given as a mapping of key fields, a whole record, or a bare
//! value for single-field keys. Resolution turns it into equality predicates
//! over the key columns after checking that exactly the key fields are
//! supplied and that each value has the declared type.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use super::errors::{StoreError, StoreResult};
use crate::schema::StructuredSchema;
use crate::storage::Predicate;
use crate::value::{Record, Timestamp, Value};

/// Identifies one record of a keyed store
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Key field name → value
    Fields(BTreeMap<String, Value>),
    /// A record whose key fields are used
    Record(Record),
    /// Value of the only key field
    Scalar(Value),
}

impl Key {
    pub fn fields<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Key::Fields(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Resolves the key against `schema` into one predicate per key field,
    /// in declaration order.
    pub fn resolve(&self, schema: &StructuredSchema) -> StoreResult<Vec<Predicate>> {
        let key_fields = schema.key_fields();
        if key_fields.is_empty() {
            return Err(StoreError::NoKeyFields {
                schema: schema.name().to_string(),
            });
        }

        let provided: BTreeMap<String, Value> = match self {
            Key::Fields(entries) => entries.clone(),
            Key::Record(record) | Key::Scalar(Value::Record(record)) => {
                if record.schema_name() != schema.name() {
                    return Err(StoreError::WrongRecordType {
                        expected: schema.name().to_string(),
                        actual: record.schema_name().to_string(),
                    });
                }
                key_fields
                    .iter()
                    .map(|f| (f.name.clone(), record.get(&f.name).cloned().unwrap_or(Value::Null)))
                    .collect()
            }
            Key::Scalar(value) => match key_fields.as_slice() {
                [only] => BTreeMap::from([(only.name.clone(), value.clone())]),
                _ => {
                    return Err(StoreError::NoSingleKey {
                        schema: schema.name().to_string(),
                    })
                }
            },
        };

        let expected: BTreeSet<&str> = key_fields.iter().map(|f| f.name.as_str()).collect();
        let supplied: BTreeSet<&str> = provided.keys().map(String::as_str).collect();
        if expected != supplied {
            return Err(StoreError::KeyMismatch {
                schema: schema.name().to_string(),
                expected: expected.iter().map(|s| s.to_string()).collect(),
                provided: supplied.iter().map(|s| s.to_string()).collect(),
            });
        }

        key_fields
            .iter()
            .map(|descriptor| -> StoreResult<Predicate> {
                let value = provided.get(&descriptor.name).cloned().unwrap_or(Value::Null);
                descriptor
                    .field_type
                    .check_value(&value, &descriptor.name)
                    .map_err(|_| StoreError::KeyTypeMismatch {
                        schema: schema.name().to_string(),
                        field: descriptor.name.clone(),
                        expected: descriptor.field_type.type_name(),
                        actual: value.type_name().to_string(),
                    })?;
                Ok(Predicate::eq(descriptor.name.clone(), value))
            })
            .collect()
    }
}

/// Renders predicates for error messages, e.g. `{index=Int(1)}`
pub(crate) fn describe(predicates: &[Predicate]) -> String {
    let mut text = String::from("{");
    for (i, predicate) in predicates.iter().enumerate() {
        if i > 0 {
            text.push_str(", ");
        }
        let _ = write!(text, "{}={:?}", predicate.column, predicate.value);
    }
    text.push('}');
    text
}

impl From<Record> for Key {
    fn from(record: Record) -> Self {
        Key::Record(record)
    }
}

impl From<&Record> for Key {
    fn from(record: &Record) -> Self {
        Key::Record(record.clone())
    }
}

impl From<BTreeMap<String, Value>> for Key {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Key::Fields(entries)
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::Scalar(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Scalar(Value::Int(value))
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Scalar(Value::Int(i64::from(value)))
    }
}

impl From<bool> for Key {
    fn from(value: bool) -> Self {
        Key::Scalar(Value::Bool(value))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Scalar(Value::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Scalar(Value::Str(value))
    }
}

impl From<Timestamp> for Key {
    fn from(value: Timestamp) -> Self {
        Key::Scalar(Value::Timestamp(value))
    }
}
