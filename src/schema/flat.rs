//! Flat schema generation
//!
//! A flat schema mirrors its structured schema field for field, in the same
//! order. Scalar fields keep their descriptor unchanged; composite fields are
//! replaced by a required string column that remembers the declared type so
//! values can be decoded again. A fixed-timezone policy, when requested, is
//! attached to every timestamp column of the schema.

use chrono_tz::Tz;

use super::classifier::{classify, classify_type, Classification, ScalarKind};
use super::errors::{SchemaError, SchemaResult};
use super::types::{FieldDescriptor, FieldType, StructuredSchema};
use crate::value::parse_timezone;

/// One column of a flat schema
#[derive(Debug, Clone, PartialEq)]
pub enum FlatField {
    /// Scalar field copied verbatim from the structured schema
    Scalar {
        descriptor: FieldDescriptor,
        kind: ScalarKind,
        fixed_timezone: Option<Tz>,
    },
    /// Composite field stored as an encoded string
    Serialized { name: String, source_type: FieldType },
}

impl FlatField {
    pub fn name(&self) -> &str {
        match self {
            FlatField::Scalar { descriptor, .. } => &descriptor.name,
            FlatField::Serialized { name, .. } => name,
        }
    }

    pub fn is_serialized(&self) -> bool {
        matches!(self, FlatField::Serialized { .. })
    }

    /// Serialized columns are never part of the key
    pub fn is_primary_key(&self) -> bool {
        match self {
            FlatField::Scalar { descriptor, .. } => descriptor.primary_key,
            FlatField::Serialized { .. } => false,
        }
    }

    /// Storage kind of the column; serialized columns are strings
    pub fn kind(&self) -> ScalarKind {
        match self {
            FlatField::Scalar { kind, .. } => *kind,
            FlatField::Serialized { .. } => ScalarKind::Str,
        }
    }

    /// Declared type of the stored column value
    pub fn column_type(&self) -> FieldType {
        match self {
            FlatField::Scalar { descriptor, .. } => descriptor.field_type.clone(),
            FlatField::Serialized { .. } => FieldType::Str,
        }
    }

    /// Whether the column accepts null
    pub fn is_nullable(&self) -> bool {
        match self {
            FlatField::Scalar { descriptor, .. } => descriptor.field_type.is_optional(),
            FlatField::Serialized { .. } => false,
        }
    }

    pub fn fixed_timezone(&self) -> Option<Tz> {
        match self {
            FlatField::Scalar { fixed_timezone, .. } => *fixed_timezone,
            FlatField::Serialized { .. } => None,
        }
    }
}

/// Storage-compatible schema derived from a structured schema
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSchema {
    name: String,
    source: String,
    table_name: String,
    fixed_timezone: Option<Tz>,
    fields: Vec<FlatField>,
}

impl FlatSchema {
    /// Generated schema name, e.g. `ModelFlatModel`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the structured schema this was derived from
    pub fn source_schema(&self) -> &str {
        &self.source
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fixed_timezone(&self) -> Option<Tz> {
        self.fixed_timezone
    }

    pub fn fields(&self) -> &[FlatField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FlatField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FlatField::name)
    }

    /// Key columns, in declaration order
    pub fn key_columns(&self) -> Vec<&FlatField> {
        self.fields.iter().filter(|f| f.is_primary_key()).collect()
    }

    /// Overrides the table name (defaults to the structured schema name)
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Checks that every column is a storable scalar.
    pub fn validate(&self) -> SchemaResult<()> {
        for field in &self.fields {
            let scalar = match field {
                FlatField::Scalar { descriptor, .. } => {
                    classify_type(&descriptor.name, &descriptor.field_type)?.is_scalar()
                }
                FlatField::Serialized { .. } => true,
            };
            if !scalar {
                return Err(SchemaError::NonScalarColumn {
                    schema: self.name.clone(),
                    column: field.name().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Derives the flat schema of a structured schema.
///
/// `fixed_timezone`, when given, must be an IANA timezone identifier and is
/// attached to every timestamp column.
///
/// # Errors
///
/// - `InvalidTimezone`: the timezone identifier is not recognised
/// - `CompositePrimaryKey`: a composite field is marked as primary key
/// - `MultiTypeUnion`: a field type is an unsupported union
pub fn generate_flat_schema(
    schema: &StructuredSchema,
    fixed_timezone: Option<&str>,
) -> SchemaResult<FlatSchema> {
    let policy = match fixed_timezone {
        Some(name) => Some(parse_timezone(name).ok_or_else(|| SchemaError::InvalidTimezone {
            timezone: name.to_string(),
        })?),
        None => None,
    };

    let mut fields = Vec::with_capacity(schema.fields().len());
    for descriptor in schema.fields() {
        let field = match classify(descriptor)? {
            Classification::Scalar(kind) => FlatField::Scalar {
                descriptor: descriptor.clone(),
                kind,
                fixed_timezone: if kind == ScalarKind::Timestamp { policy } else { None },
            },
            Classification::Composite => {
                if descriptor.primary_key {
                    return Err(SchemaError::CompositePrimaryKey {
                        schema: schema.name().to_string(),
                        field: descriptor.name.clone(),
                    });
                }
                FlatField::Serialized {
                    name: descriptor.name.clone(),
                    source_type: descriptor.field_type.clone(),
                }
            }
        };
        fields.push(field);
    }

    let flat = FlatSchema {
        name: format!("{}FlatModel", schema.name()),
        source: schema.name().to_string(),
        table_name: schema.name().to_string(),
        fixed_timezone: policy,
        fields,
    };
    flat.validate()?;
    Ok(flat)
}
