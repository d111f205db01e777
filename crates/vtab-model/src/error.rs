use thiserror::Error;

use crate::entity::VariableEntity;
use crate::value_type::ValueType;

/// Errors raised by the value, variable and table model.
///
/// Lookup variants always carry the coordinate that could not be resolved.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot convert '{input}' to {value_type}")]
    TypeConversion { value_type: ValueType, input: String },

    #[error("cannot compare {left} value with {right} value")]
    IllegalComparison { left: ValueType, right: ValueType },

    #[error("{value_type} value is not a sequence")]
    NotASequence { value_type: ValueType },

    #[error("{declared} value cannot carry a {actual} payload")]
    PayloadMismatch {
        declared: ValueType,
        actual: ValueType,
    },

    #[error("sequence of {expected} cannot hold {actual} value")]
    InvalidSequence {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("no such table '{table}' in datasource '{datasource}'")]
    NoSuchValueTable { datasource: String, table: String },

    #[error("no such variable '{variable}' in '{table}'")]
    NoSuchVariable { table: String, variable: String },

    #[error("no value set for {entity} in table '{table}'")]
    NoSuchValueSet {
        table: String,
        entity: VariableEntity,
    },

    #[error("invalid {kind} name: '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("variable '{variable}' expects {expected} values, got {actual}")]
    ValueTypeMismatch {
        variable: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("table '{table}' holds '{expected}' entities, got '{actual}'")]
    EntityTypeMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("invalid value for variable '{variable}': {message}")]
    InvalidValue { variable: String, message: String },

    #[error("script execution failed for '{script}': {message}")]
    ScriptExecution { script: String, message: String },

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

impl ModelError {
    pub fn no_such_table(datasource: impl Into<String>, table: impl Into<String>) -> Self {
        Self::NoSuchValueTable {
            datasource: datasource.into(),
            table: table.into(),
        }
    }

    pub fn no_such_variable(table: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::NoSuchVariable {
            table: table.into(),
            variable: variable.into(),
        }
    }

    pub fn no_such_value_set(table: impl Into<String>, entity: &VariableEntity) -> Self {
        Self::NoSuchValueSet {
            table: table.into(),
            entity: entity.clone(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation(operation.into())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
