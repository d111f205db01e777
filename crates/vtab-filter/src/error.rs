use thiserror::Error;

use vtab_model::ModelError;

use crate::state::FilterState;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("illegal filter state transition from {from} to {to}")]
    IllegalTransition { from: FilterState, to: FilterState },

    #[error("invalid pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<FilterError> for ModelError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Model(inner) => inner,
            other => ModelError::Evaluation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
