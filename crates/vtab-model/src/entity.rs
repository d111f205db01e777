use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Key of one row: an entity type and an identifier within that type.
///
/// Ordered by `(entity_type, identifier)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableEntity {
    entity_type: String,
    identifier: String,
}

impl VariableEntity {
    pub fn new(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Like [`VariableEntity::new`] but rejects blank parts.
    pub fn try_new(entity_type: impl Into<String>, identifier: impl Into<String>) -> Result<Self> {
        let entity = Self::new(entity_type, identifier);
        if entity.entity_type.trim().is_empty() {
            return Err(ModelError::InvalidName {
                kind: "entity type",
                name: entity.entity_type,
            });
        }
        if entity.identifier.trim().is_empty() {
            return Err(ModelError::InvalidName {
                kind: "entity identifier",
                name: entity.identifier,
            });
        }
        Ok(entity)
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl fmt::Display for VariableEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.identifier)
    }
}
