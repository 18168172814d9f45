//! Schema error types
//!
//! Error codes:
//! - FLAT_SCHEMA_MULTI_TYPE_UNION (FATAL)
//! - FLAT_SCHEMA_UNSUPPORTED_MAP_KEY (FATAL)
//! - FLAT_SCHEMA_DUPLICATE_FIELD (FATAL)
//! - FLAT_SCHEMA_INVALID_DEFAULT (FATAL)
//! - FLAT_SCHEMA_COMPOSITE_KEY (FATAL)
//! - FLAT_SCHEMA_INVALID_TIMEZONE (FATAL)
//! - FLAT_SCHEMA_NON_SCALAR_COLUMN (FATAL)
//! - FLAT_SCHEMA_ALREADY_LINKED (FATAL)
//! - FLAT_SCHEMA_NOT_LINKED (FATAL)
//! - FLAT_SCHEMA_CONFIG (FATAL)
//! - FLAT_RECORD_INVALID (FATAL)
//!
//! Every schema error is a configuration or precondition violation; none is
//! retried.

use std::fmt;

use thiserror::Error;

use crate::error::{ErrorKind, Severity};

/// Validation failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field path (e.g., "address.city")
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: "field to be present".into(),
            actual: "missing".into(),
        }
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: "no undeclared fields".into(),
            actual: "extra field present".into(),
        }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::new(field, expected, actual)
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': expected {}, got {}", self.field, self.expected, self.actual)
    }
}

/// Schema declaration, generation and linking errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Union with more than one non-absent alternative
    #[error("field '{field}': union of multiple types is not supported, except with null ({alternatives})")]
    MultiTypeUnion { field: String, alternatives: String },

    /// Map keyed by a type that has no scalar text form
    #[error("field '{field}': map keys must be scalar, got {key_type}")]
    UnsupportedMapKey { field: String, key_type: String },

    #[error("schema '{schema}' declares field '{field}' more than once")]
    DuplicateField { schema: String, field: String },

    #[error("schema '{schema}' has an invalid default: {details}")]
    InvalidDefault { schema: String, details: ValidationDetails },

    /// Composite fields are stored serialized and cannot act as keys
    #[error("schema '{schema}': composite field '{field}' cannot be a primary key")]
    CompositePrimaryKey { schema: String, field: String },

    #[error("'{timezone}' is not a valid timezone identifier")]
    InvalidTimezone { timezone: String },

    #[error("flat schema '{schema}' has non-scalar column '{column}'")]
    NonScalarColumn { schema: String, column: String },

    #[error("schema '{schema}' is already linked")]
    AlreadyLinked { schema: String },

    #[error("schema '{schema}' is not linked; link it in the schema registry before use")]
    NotLinked { schema: String },

    /// Link options file cannot be read or parsed
    #[error("invalid link options '{path}': {reason}")]
    Config { path: String, reason: String },

    /// Record does not conform to its schema
    #[error("record does not conform to schema '{schema}': {details}")]
    InvalidRecord { schema: String, details: ValidationDetails },
}

impl SchemaError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::MultiTypeUnion { .. } => "FLAT_SCHEMA_MULTI_TYPE_UNION",
            SchemaError::UnsupportedMapKey { .. } => "FLAT_SCHEMA_UNSUPPORTED_MAP_KEY",
            SchemaError::DuplicateField { .. } => "FLAT_SCHEMA_DUPLICATE_FIELD",
            SchemaError::InvalidDefault { .. } => "FLAT_SCHEMA_INVALID_DEFAULT",
            SchemaError::CompositePrimaryKey { .. } => "FLAT_SCHEMA_COMPOSITE_KEY",
            SchemaError::InvalidTimezone { .. } => "FLAT_SCHEMA_INVALID_TIMEZONE",
            SchemaError::NonScalarColumn { .. } => "FLAT_SCHEMA_NON_SCALAR_COLUMN",
            SchemaError::AlreadyLinked { .. } => "FLAT_SCHEMA_ALREADY_LINKED",
            SchemaError::NotLinked { .. } => "FLAT_SCHEMA_NOT_LINKED",
            SchemaError::Config { .. } => "FLAT_SCHEMA_CONFIG",
            SchemaError::InvalidRecord { .. } => "FLAT_RECORD_INVALID",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Precondition
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub(crate) fn invalid_record(schema: impl Into<String>, details: ValidationDetails) -> Self {
        SchemaError::InvalidRecord {
            schema: schema.into(),
            details,
        }
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
