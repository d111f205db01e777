use thiserror::Error;

use vtab_filter::FilterError;
use vtab_model::ModelError;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("syntax error in '{script}' at {position}: {message}")]
    Syntax {
        script: String,
        position: usize,
        message: String,
    },

    #[error("script '{script}' failed: {message}")]
    Execution { script: String, message: String },

    #[error("variable '{variable}' has no script attribute")]
    MissingScript { variable: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<ScriptError> for ModelError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Execution { script, message } => {
                ModelError::ScriptExecution { script, message }
            }
            ScriptError::Model(inner) => inner,
            other => ModelError::Evaluation(other.to_string()),
        }
    }
}

impl From<ScriptError> for FilterError {
    fn from(err: ScriptError) -> Self {
        FilterError::Model(err.into())
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
