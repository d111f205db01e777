//! Runtime configuration.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewError};

/// Settings shared by every component of a [`Runtime`](crate::Runtime).
///
/// Missing keys in a configuration file take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory of persisted view definitions.
    ///
    /// `None` keeps views in memory only.
    pub views_dir: Option<PathBuf>,

    /// Worker threads used by the table copier.
    pub copy_workers: NonZeroUsize,

    /// Entity type of tables loaded without an explicit one.
    pub default_entity_type: String,

    /// Field delimiter of CSV tables.
    pub csv_delimiter: char,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            views_dir: None,
            copy_workers: NonZeroUsize::MIN,
            default_entity_type: "Participant".to_string(),
            csv_delimiter: ',',
        }
    }
}

impl RuntimeConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ViewError::Io {
            operation: "read",
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ViewError::Config {
            path: path.to_path_buf(),
            source: e,
        })
    }

    #[must_use]
    pub fn with_views_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.views_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_copy_workers(mut self, workers: NonZeroUsize) -> Self {
        self.copy_workers = workers;
        self
    }

    /// The delimiter as a single byte, if it is ASCII.
    pub fn csv_delimiter_byte(&self) -> Option<u8> {
        u8::try_from(self.csv_delimiter).ok().filter(u8::is_ascii)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.copy_workers.get(), 1);
        assert_eq!(config.default_entity_type, "Participant");
        assert_eq!(config.csv_delimiter_byte(), Some(b','));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vtab.toml");
        fs::write(&path, "copy_workers = 4\ncsv_delimiter = \";\"\n").expect("write");
        let config = RuntimeConfig::load(&path).expect("load");
        assert_eq!(config.copy_workers.get(), 4);
        assert_eq!(config.csv_delimiter, ';');
        assert!(config.views_dir.is_none());
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vtab.toml");
        fs::write(&path, "copy_workers = 0\n").expect("write");
        let err = RuntimeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ViewError::Config { path: ref p, .. } if p == &path));
    }

    #[test]
    fn test_non_ascii_delimiter() {
        let config = RuntimeConfig {
            csv_delimiter: '§',
            ..RuntimeConfig::default()
        };
        assert_eq!(config.csv_delimiter_byte(), None);
    }
}
