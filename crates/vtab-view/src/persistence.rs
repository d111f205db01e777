//! View definition persistence.
//!
//! A strategy stores the complete list of view definitions of one
//! datasource. `write_views` replaces what was stored; there is no
//! incremental update.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vtab_model::ModelError;

use crate::definition::ViewDefinition;
use crate::error::{Result, ViewError};

/// Current version of the view file layout.
pub const VIEW_FILE_VERSION: u32 = 1;

pub trait ViewPersistenceStrategy: Send + Sync {
    /// Stored definitions in registration order. Unknown datasources have
    /// none.
    fn read_views(&self, datasource: &str) -> Result<Vec<ViewDefinition>>;

    fn write_views(&self, datasource: &str, views: &[ViewDefinition]) -> Result<()>;
}

/// Keeps definitions in process memory.
#[derive(Debug, Default)]
pub struct MemoryViewPersistence {
    views: Mutex<BTreeMap<String, Vec<ViewDefinition>>>,
}

impl MemoryViewPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewPersistenceStrategy for MemoryViewPersistence {
    fn read_views(&self, datasource: &str) -> Result<Vec<ViewDefinition>> {
        let views = self
            .views
            .lock()
            .map_err(|_| ModelError::Lock("view store lock poisoned".to_string()))?;
        Ok(views.get(datasource).cloned().unwrap_or_default())
    }

    fn write_views(&self, datasource: &str, views: &[ViewDefinition]) -> Result<()> {
        let mut stored = self
            .views
            .lock()
            .map_err(|_| ModelError::Lock("view store lock poisoned".to_string()))?;
        if views.is_empty() {
            stored.remove(datasource);
        } else {
            stored.insert(datasource.to_string(), views.to_vec());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewFile {
    version: u32,
    datasource: String,
    views: Vec<ViewDefinition>,
}

/// Stores each datasource's views as `<dir>/<datasource>.views.json`.
#[derive(Debug, Clone)]
pub struct JsonFileViewPersistence {
    dir: PathBuf,
}

impl JsonFileViewPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the views of `datasource`.
    ///
    /// The name must stay inside the directory: blank names, `.`, `..` and
    /// names containing a path separator or NUL are an
    /// [`ModelError::InvalidName`].
    pub fn path_for(&self, datasource: &str) -> Result<PathBuf> {
        let escapes = datasource.trim().is_empty()
            || datasource == "."
            || datasource == ".."
            || datasource.contains(['/', '\\', '\0']);
        if escapes {
            return Err(ModelError::InvalidName {
                kind: "datasource",
                name: datasource.to_string(),
            }
            .into());
        }
        Ok(self.dir.join(format!("{datasource}.views.json")))
    }
}

fn write_temp(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp = File::create(temp_path).map_err(|e| ViewError::Io {
        operation: "create",
        path: temp_path.to_path_buf(),
        source: e,
    })?;
    temp.write_all(bytes).map_err(|e| ViewError::Io {
        operation: "write",
        path: temp_path.to_path_buf(),
        source: e,
    })?;
    temp.sync_all().map_err(|e| ViewError::Io {
        operation: "sync",
        path: temp_path.to_path_buf(),
        source: e,
    })
}

impl ViewPersistenceStrategy for JsonFileViewPersistence {
    fn read_views(&self, datasource: &str) -> Result<Vec<ViewDefinition>> {
        let path = self.path_for(datasource)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path).map_err(|e| ViewError::Io {
            operation: "read",
            path: path.clone(),
            source: e,
        })?;
        let file: ViewFile =
            serde_json::from_slice(&bytes).map_err(|e| ViewError::Serialization {
                path: path.clone(),
                source: e,
            })?;
        if file.version > VIEW_FILE_VERSION {
            return Err(ViewError::UnsupportedVersion {
                found: file.version,
                max_supported: VIEW_FILE_VERSION,
                path,
            });
        }
        debug!(datasource, path = %path.display(), count = file.views.len(), "read view definitions");
        Ok(file.views)
    }

    fn write_views(&self, datasource: &str, views: &[ViewDefinition]) -> Result<()> {
        let path = self.path_for(datasource)?;
        let file = ViewFile {
            version: VIEW_FILE_VERSION,
            datasource: datasource.to_string(),
            views: views.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| ViewError::Serialization {
            path: path.clone(),
            source: e,
        })?;

        fs::create_dir_all(&self.dir).map_err(|e| ViewError::Io {
            operation: "create directory",
            path: self.dir.clone(),
            source: e,
        })?;

        let temp_path = path.with_extension("json.tmp");
        let written = write_temp(&temp_path, &bytes).and_then(|()| {
            fs::rename(&temp_path, &path).map_err(|e| ViewError::AtomicWriteFailed {
                temp_path: temp_path.clone(),
                target_path: path.clone(),
                source: e,
            })
        });
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %temp_path.display(), error = %cleanup, "could not remove temp file");
            }
            return Err(err);
        }

        info!(datasource, path = %path.display(), count = views.len(), "saved view definitions");
        Ok(())
    }
}
