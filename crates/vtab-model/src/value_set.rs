use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::entity::VariableEntity;

/// One entity's row within one table.
///
/// A value set only names its coordinates; values are resolved lazily
/// through the owning table's variable value sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueSet {
    table: Arc<str>,
    entity: VariableEntity,
}

impl ValueSet {
    pub fn new(table: impl Into<Arc<str>>, entity: VariableEntity) -> Self {
        Self {
            table: table.into(),
            entity,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn entity(&self) -> &VariableEntity {
        &self.entity
    }

    /// Same table, different entity.
    #[must_use]
    pub fn with_entity(&self, entity: VariableEntity) -> Self {
        Self {
            table: Arc::clone(&self.table),
            entity,
        }
    }
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.table, self.entity)
    }
}

/// One repeated measurement of an occurrence group within a value set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Occurrence {
    value_set: ValueSet,
    group: String,
    order: usize,
}

impl Occurrence {
    pub fn new(value_set: ValueSet, group: impl Into<String>, order: usize) -> Self {
        Self {
            value_set,
            group: group.into(),
            order,
        }
    }

    pub fn value_set(&self) -> &ValueSet {
        &self.value_set
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Zero-based position within the group's sequences.
    pub fn order(&self) -> usize {
        self.order
    }
}
