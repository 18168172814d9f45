//! Codec error types
//!
//! Error codes:
//! - FLAT_CODEC_RECORD_TYPE_MISMATCH (FATAL)
//! - FLAT_CODEC_ENCODE_FAILED (FATAL)
//! - FLAT_CODEC_DECODE_FAILED (FATAL)
//! - FLAT_CODEC_TIMEZONE_MISMATCH (FATAL)
//! - schema errors are passed through with their own codes

use thiserror::Error;

use crate::error::{ErrorKind, Severity};
use crate::schema::SchemaError;

/// Errors raised while flattening or rehydrating records
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Record built for another schema than the one used to convert it
    #[error("record of schema '{actual}' cannot be converted with schema '{expected}'")]
    RecordTypeMismatch { expected: String, actual: String },

    #[error("cannot encode '{path}': {reason}")]
    Encode { path: String, reason: String },

    #[error("cannot decode '{path}': {reason}")]
    Decode { path: String, reason: String },

    /// Timestamp zone differs from the schema's fixed-timezone policy
    #[error("timestamp field '{field}' ({value}) must have the fixed timezone {expected}")]
    TimezoneMismatch {
        field: String,
        value: String,
        expected: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl CodecError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::RecordTypeMismatch { .. } => "FLAT_CODEC_RECORD_TYPE_MISMATCH",
            CodecError::Encode { .. } => "FLAT_CODEC_ENCODE_FAILED",
            CodecError::Decode { .. } => "FLAT_CODEC_DECODE_FAILED",
            CodecError::TimezoneMismatch { .. } => "FLAT_CODEC_TIMEZONE_MISMATCH",
            CodecError::Schema(e) => e.code(),
        }
    }

    /// All codec failures are precondition violations or corrupted state
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Precondition
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub(crate) fn encode(path: &str, reason: impl Into<String>) -> Self {
        CodecError::Encode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(path: &str, reason: impl Into<String>) -> Self {
        CodecError::Decode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_errors_keep_their_code() {
        let err = CodecError::from(SchemaError::NotLinked {
            schema: "Model".into(),
        });
        assert_eq!(err.code(), "FLAT_SCHEMA_NOT_LINKED");
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_timezone_mismatch_display() {
        let err = CodecError::TimezoneMismatch {
            field: "dt".into(),
            value: "2024-01-01T00:00:00[America/Los_Angeles]".into(),
            expected: "UTC".into(),
        };
        let display = err.to_string();
        assert!(display.contains("dt"));
        assert!(display.contains("UTC"));
        assert_eq!(err.code(), "FLAT_CODEC_TIMEZONE_MISMATCH");
    }
}
