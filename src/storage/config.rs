//! SQLite engine configuration

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::{StorageError, StorageResult};

/// Configuration for [`SqliteEngine`](super::SqliteEngine).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a writer waits for a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads the configuration from a JSON document; omitted keys keep
    /// their defaults.
    pub fn from_json_file(path: &Path) -> StorageResult<Self> {
        let config_error = |reason: String| StorageError::Config {
            path: path.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default_in_memory() {
        let config = SqliteConfig::default();
        assert!(config.is_in_memory());
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_file() {
        let config = SqliteConfig::file("/tmp/flat.db");
        assert_eq!(config.path, Some(PathBuf::from("/tmp/flat.db")));
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_config_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"path": "records.db"}}"#).unwrap();

        let config = SqliteConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("records.db")));
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_from_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = SqliteConfig::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.code(), "FLAT_STORAGE_CONFIG");
    }
}
