//! Field classification: scalar or composite
//!
//! A field is scalar iff its declared type is one of the storable kinds
//! (bool, int, float, string, bytes, timestamp), an enumeration backed by
//! one of them, or an optional wrapper around such a type. Everything else
//! is composite. Classification never looks inside a composite type.

use super::errors::{SchemaError, SchemaResult};
use super::types::{EnumBacking, FieldDescriptor, FieldType};

/// Storable scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    Timestamp,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Str => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Timestamp => "timestamp",
        }
    }
}

/// Outcome of classifying one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Scalar(ScalarKind),
    Composite,
}

impl Classification {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Classification::Scalar(_))
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, Classification::Scalar(ScalarKind::Timestamp))
    }
}

/// Classifies a field descriptor
pub fn classify(field: &FieldDescriptor) -> SchemaResult<Classification> {
    classify_type(&field.name, &field.field_type)
}

/// Classifies a declared type.
///
/// # Errors
///
/// Returns `SchemaError::MultiTypeUnion` for a union with more than one
/// non-null alternative.
pub fn classify_type(field: &str, field_type: &FieldType) -> SchemaResult<Classification> {
    let kind = match field_type {
        FieldType::Optional(inner) => return classify_type(field, inner),
        FieldType::Union(alternatives) => {
            let concrete: Vec<&FieldType> = alternatives
                .iter()
                .filter(|t| **t != FieldType::Null)
                .collect();
            return match concrete.as_slice() {
                [single] => classify_type(field, single),
                _ => Err(SchemaError::MultiTypeUnion {
                    field: field.to_string(),
                    alternatives: field_type.type_name(),
                }),
            };
        }
        FieldType::Bool => ScalarKind::Bool,
        FieldType::Int => ScalarKind::Int,
        FieldType::Float => ScalarKind::Float,
        FieldType::Str => ScalarKind::Str,
        FieldType::Bytes => ScalarKind::Bytes,
        FieldType::Timestamp => ScalarKind::Timestamp,
        FieldType::Enum(e) => match e.backing() {
            EnumBacking::Str => ScalarKind::Str,
            EnumBacking::Int => ScalarKind::Int,
        },
        FieldType::Null
        | FieldType::Uuid
        | FieldType::List(_)
        | FieldType::Set(_)
        | FieldType::Map(_, _)
        | FieldType::Record(_) => return Ok(Classification::Composite),
    };
    Ok(Classification::Scalar(kind))
}
