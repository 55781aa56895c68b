//! Configuration loading
//!
//! Resolution priority order:
//! 1. Explicit path handed in by the caller (highest priority)
//! 2. `REGTRACK_CONFIG` environment variable
//! 3. Compiled defaults (fallback)
//!
//! Individual keys can additionally be overridden through environment
//! variables (`REGTRACK_DB_PATH`, `REGTRACK_OBJECT_STORE_ROOT`,
//! `CSV_IMPORT_BATCH_SIZE`).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default number of in-flight rows per import batch
pub const DEFAULT_CSV_IMPORT_BATCH_SIZE: usize = 100;

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegtrackConfig {
    /// Path of the SQLite record database
    pub db_path: PathBuf,
    /// Root directory of the document blob store
    pub object_store_root: PathBuf,
    /// Number of rows processed concurrently per import batch
    pub csv_import_batch_size: usize,
}

impl Default for RegtrackConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("regtrack.db"),
            object_store_root: PathBuf::from("regtrack_objects"),
            csv_import_batch_size: DEFAULT_CSV_IMPORT_BATCH_SIZE,
        }
    }
}

impl RegtrackConfig {
    /// Load configuration following the priority order above
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Ok(path) = std::env::var("REGTRACK_CONFIG") {
            Self::from_file(Path::new(&path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        if config.csv_import_batch_size == 0 {
            return Err(Error::Config(
                "csv_import_batch_size must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("REGTRACK_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("REGTRACK_OBJECT_STORE_ROOT") {
            self.object_store_root = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var("CSV_IMPORT_BATCH_SIZE") {
            if let Ok(size) = size.parse::<usize>() {
                self.csv_import_batch_size = size;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RegtrackConfig::default();
        assert_eq!(config.csv_import_batch_size, 100);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "db_path = \"/tmp/records.db\"\ncsv_import_batch_size = 25"
        )
        .unwrap();
        file.flush().unwrap();

        let config = RegtrackConfig::from_file(file.path()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/records.db"));
        assert_eq!(config.csv_import_batch_size, 25);
        // Unspecified keys fall back to defaults
        assert_eq!(
            config.object_store_root,
            PathBuf::from("regtrack_objects")
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = RegtrackConfig::from_file(Path::new("/nonexistent/regtrack.toml"));
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
