//! Keyed store error types
//!
//! Error codes:
//! - FLAT_KEY_NOT_FOUND (ERROR) - key resolved to zero rows
//! - FLAT_KEY_MISMATCH (FATAL) - key fields differ from the schema's key
//! - FLAT_KEY_TYPE_MISMATCH (FATAL) - key value has the wrong type
//! - FLAT_KEY_NOT_SINGLE (FATAL) - bare key used on a multi-field key
//! - FLAT_KEY_UNDEFINED (FATAL) - key operation on a schema without key
//! - FLAT_KEY_NOT_UNIQUE (FATAL) - key matched more than one row
//! - FLAT_STORE_WRONG_RECORD_TYPE (FATAL) - record of another schema
//!
//! Schema, codec and storage errors keep their own codes.

use thiserror::Error;

use crate::codec::CodecError;
use crate::error::{ErrorKind, Severity};
use crate::schema::SchemaError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key {key} not found in table '{table}'")]
    KeyNotFound { table: String, key: String },

    #[error("key fields {provided:?} do not match the key {expected:?} of '{schema}'")]
    KeyMismatch {
        schema: String,
        expected: Vec<String>,
        provided: Vec<String>,
    },

    #[error("key field '{field}' of '{schema}' expects {expected}, got {actual}")]
    KeyTypeMismatch {
        schema: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("schema '{schema}' has no single key field")]
    NoSingleKey { schema: String },

    #[error("schema '{schema}' declares no key fields")]
    NoKeyFields { schema: String },

    #[error("key {key} matched {count} rows in table '{table}'")]
    DuplicateKeyMatch { table: String, key: String, count: usize },

    #[error("record of schema '{actual}' passed to the store of '{expected}'")]
    WrongRecordType { expected: String, actual: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::KeyNotFound { .. } => "FLAT_KEY_NOT_FOUND",
            StoreError::KeyMismatch { .. } => "FLAT_KEY_MISMATCH",
            StoreError::KeyTypeMismatch { .. } => "FLAT_KEY_TYPE_MISMATCH",
            StoreError::NoSingleKey { .. } => "FLAT_KEY_NOT_SINGLE",
            StoreError::NoKeyFields { .. } => "FLAT_KEY_UNDEFINED",
            StoreError::DuplicateKeyMatch { .. } => "FLAT_KEY_NOT_UNIQUE",
            StoreError::WrongRecordType { .. } => "FLAT_STORE_WRONG_RECORD_TYPE",
            StoreError::Schema(e) => e.code(),
            StoreError::Codec(e) => e.code(),
            StoreError::Storage(e) => e.code(),
        }
    }

    /// Category of the failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::KeyNotFound { .. } => ErrorKind::NotFound,
            StoreError::DuplicateKeyMatch { .. } => ErrorKind::InternalConsistency,
            StoreError::KeyMismatch { .. }
            | StoreError::KeyTypeMismatch { .. }
            | StoreError::NoSingleKey { .. }
            | StoreError::NoKeyFields { .. }
            | StoreError::WrongRecordType { .. } => ErrorKind::Precondition,
            StoreError::Schema(e) => e.kind(),
            StoreError::Codec(e) => e.kind(),
            StoreError::Storage(e) => e.kind(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StoreError::Storage(e) => e.severity(),
            _ => self.kind().severity(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_integrity(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }
}

/// Result type for keyed store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_recoverable() {
        let err = StoreError::KeyNotFound {
            table: "Model".into(),
            key: "{index=1}".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(err.code(), "FLAT_KEY_NOT_FOUND");
    }

    #[test]
    fn test_duplicate_match_is_fatal() {
        let err = StoreError::DuplicateKeyMatch {
            table: "Model".into(),
            key: "{index=1}".into(),
            count: 2,
        };
        assert_eq!(err.kind(), ErrorKind::InternalConsistency);
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_wrapped_errors_keep_kind_and_code() {
        let err = StoreError::from(StorageError::Integrity {
            table: "Model".into(),
            reason: "duplicate".into(),
        });
        assert!(err.is_integrity());
        assert_eq!(err.code(), "FLAT_STORAGE_INTEGRITY");

        let err = StoreError::from(SchemaError::NotLinked {
            schema: "Model".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_key_mismatch_display() {
        let err = StoreError::KeyMismatch {
            schema: "Model".into(),
            expected: vec!["index".into()],
            provided: vec!["desc".into()],
        };
        let display = err.to_string();
        assert!(display.contains("index"));
        assert!(display.contains("desc"));
    }
}
