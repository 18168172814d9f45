//! Storage error types
//!
//! Error codes:
//! - FLAT_STORAGE_INTEGRITY (ERROR) - constraint violation, e.g. duplicate key
//! - FLAT_STORAGE_UNKNOWN_TABLE (FATAL) - table used before it was created
//! - FLAT_STORAGE_CONVERSION (ERROR) - value cannot be mapped to or from a column
//! - FLAT_STORAGE_KEY_EXHAUSTED (ERROR) - no integer key left to assign
//! - FLAT_STORAGE_CONFIG (ERROR) - engine configuration cannot be loaded
//! - FLAT_STORAGE_POISONED (FATAL) - engine lock poisoned by a panicking writer
//! - FLAT_STORAGE_BACKEND (ERROR) - any other backend failure

use thiserror::Error;

use crate::error::{ErrorKind, Severity};

#[derive(Debug, Error)]
pub enum StorageError {
    /// Constraint violation reported by the engine
    #[error("integrity violation on table '{table}': {reason}")]
    Integrity { table: String, reason: String },

    #[error("table '{table}' does not exist")]
    UnknownTable { table: String },

    #[error("column '{column}' cannot be converted: {reason}")]
    Conversion { column: String, reason: String },

    #[error("no key left to assign in column '{column}' of table '{table}'")]
    KeyExhausted { table: String, column: String },

    #[error("invalid storage configuration '{path}': {reason}")]
    Config { path: String, reason: String },

    #[error("storage engine lock poisoned")]
    Poisoned,

    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Integrity { .. } => "FLAT_STORAGE_INTEGRITY",
            StorageError::UnknownTable { .. } => "FLAT_STORAGE_UNKNOWN_TABLE",
            StorageError::Conversion { .. } => "FLAT_STORAGE_CONVERSION",
            StorageError::KeyExhausted { .. } => "FLAT_STORAGE_KEY_EXHAUSTED",
            StorageError::Config { .. } => "FLAT_STORAGE_CONFIG",
            StorageError::Poisoned => "FLAT_STORAGE_POISONED",
            StorageError::Sqlite(_) => "FLAT_STORAGE_BACKEND",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Integrity { .. } => ErrorKind::Integrity,
            StorageError::UnknownTable { .. } => ErrorKind::Precondition,
            _ => ErrorKind::Storage,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorageError::Poisoned => Severity::Fatal,
            _ => self.kind().severity(),
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, StorageError::Integrity { .. })
    }

    pub(crate) fn integrity(table: &str, reason: impl Into<String>) -> Self {
        StorageError::Integrity {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conversion(column: &str, reason: impl Into<String>) -> Self {
        StorageError::Conversion {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// Classifies a SQLite failure on `table`; constraint violations become
    /// integrity errors.
    pub(crate) fn from_sqlite(table: &str, err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let reason = message.clone().unwrap_or_else(|| failure.to_string());
                StorageError::integrity(table, reason)
            }
            _ => StorageError::Sqlite(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_classification() {
        let err = StorageError::integrity("Model", "UNIQUE constraint failed: Model.index");
        assert_eq!(err.code(), "FLAT_STORAGE_INTEGRITY");
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.severity(), Severity::Error);
        assert!(err.is_integrity());
        assert!(err.to_string().contains("Model"));
    }

    #[test]
    fn test_poisoned_is_fatal() {
        assert_eq!(StorageError::Poisoned.severity(), Severity::Fatal);
        assert_eq!(StorageError::Poisoned.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_sqlite_constraint_maps_to_integrity() {
        let failure = rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY);
        let err = StorageError::from_sqlite(
            "Model",
            rusqlite::Error::SqliteFailure(failure, Some("UNIQUE constraint failed".into())),
        );
        assert!(err.is_integrity());
    }

    #[test]
    fn test_other_sqlite_failures_stay_backend_errors() {
        let err = StorageError::from_sqlite("Model", rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.code(), "FLAT_STORAGE_BACKEND");
    }
}
