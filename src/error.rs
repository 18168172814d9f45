//! Shared error classification
//!
//! Every subsystem error maps onto one of the kinds below:
//! - NotFound: key lookup resolved to zero rows (recoverable)
//! - Precondition: misuse of a schema, record or key (fatal, never retried)
//! - Integrity: constraint violation reported by the storage engine
//! - InternalConsistency: a key lookup matched more than one row
//! - Storage: any other storage engine failure

use std::fmt;

/// Severity levels shared by all subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed, caller may handle it as normal control flow
    Error,
    /// Misuse or corrupted state, the calling operation must halt
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Error taxonomy surfaced to callers of the keyed store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Precondition,
    Integrity,
    InternalConsistency,
    Storage,
}

impl ErrorKind {
    /// Severity implied by the kind
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::NotFound | ErrorKind::Integrity | ErrorKind::Storage => Severity::Error,
            ErrorKind::Precondition | ErrorKind::InternalConsistency => Severity::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Integrity => "integrity",
            ErrorKind::InternalConsistency => "internal-consistency",
            ErrorKind::Storage => "storage",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_severity() {
        assert_eq!(ErrorKind::NotFound.severity(), Severity::Error);
        assert_eq!(ErrorKind::Integrity.severity(), Severity::Error);
        assert_eq!(ErrorKind::Precondition.severity(), Severity::Fatal);
        assert_eq!(ErrorKind::InternalConsistency.severity(), Severity::Fatal);
    }

    #[test]
    fn test_display() {
        assert_eq!(Severity::Fatal.to_string(), "FATAL");
        assert_eq!(ErrorKind::InternalConsistency.to_string(), "internal-consistency");
    }
}
