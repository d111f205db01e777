//! View layer error types.
//!
//! Lookup failures name the datasource, view or key that could not be
//! resolved. Persistence failures carry the path they were raised for.

use std::path::PathBuf;

use thiserror::Error;

use vtab_filter::FilterError;
use vtab_model::ModelError;
use vtab_script::ScriptError;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("no such datasource: {name}")]
    NoSuchDatasource { name: String },

    #[error("no such view '{view}' in datasource '{datasource}'")]
    NoSuchView { datasource: String, view: String },

    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("mapping is not injective: {key} appears more than once")]
    NonInjectiveMapping { key: String },

    #[error("invalid definition for view '{view}': {message}")]
    InvalidDefinition { view: String, message: String },

    #[error("runtime is {actual}, expected {expected}")]
    IllegalState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to {operation} file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed view file: {path}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("view file version {found} is not supported (maximum: {max_supported})")]
    UnsupportedVersion {
        found: u32,
        max_supported: u32,
        path: PathBuf,
    },

    #[error("invalid configuration file: {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ViewError {
    pub fn no_such_view(datasource: impl Into<String>, view: impl Into<String>) -> Self {
        Self::NoSuchView {
            datasource: datasource.into(),
            view: view.into(),
        }
    }

    pub fn invalid_definition(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            view: view.into(),
            message: message.into(),
        }
    }
}

impl From<ViewError> for ModelError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::Model(inner) => inner,
            ViewError::Filter(inner) => inner.into(),
            ViewError::Script(inner) => inner.into(),
            other => ModelError::Evaluation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;
