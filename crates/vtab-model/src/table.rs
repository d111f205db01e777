//! Value tables and variable value sources.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::entity::VariableEntity;
use crate::error::{ModelError, Result};
use crate::value::Value;
use crate::value_set::{Occurrence, ValueSet};
use crate::variable::Variable;

/// Computes or fetches the value of one variable for a value set.
///
/// `table` is the table the value set belongs to. Computed sources use it to
/// resolve other variables of the same row; storage-backed sources may
/// ignore it.
pub trait VariableValueSource: Send + Sync + fmt::Debug {
    fn variable(&self) -> &Variable;

    fn value(&self, value_set: &ValueSet, table: &dyn ValueTable) -> Result<Value>;

    /// The source this one decorates, if any.
    fn wrapped(&self) -> Option<&Arc<dyn VariableValueSource>> {
        None
    }
}

/// A named set of variables and per-entity value sets for one entity type.
pub trait ValueTable: Send + Sync {
    fn name(&self) -> &str;

    fn entity_type(&self) -> &str;

    fn datasource_name(&self) -> &str;

    fn variables(&self) -> Result<Vec<Variable>>;

    fn variable(&self, name: &str) -> Result<Variable> {
        self.variables()?
            .into_iter()
            .find(|variable| variable.name() == name)
            .ok_or_else(|| ModelError::no_such_variable(self.name(), name))
    }

    fn has_variable(&self, name: &str) -> Result<bool> {
        match self.variable(name) {
            Ok(_) => Ok(true),
            Err(ModelError::NoSuchVariable { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn variable_entities(&self) -> Result<BTreeSet<VariableEntity>>;

    fn has_value_set(&self, entity: &VariableEntity) -> Result<bool> {
        Ok(self.variable_entities()?.contains(entity))
    }

    fn value_set(&self, entity: &VariableEntity) -> Result<ValueSet> {
        if self.has_value_set(entity)? {
            Ok(ValueSet::new(self.name(), entity.clone()))
        } else {
            Err(ModelError::no_such_value_set(self.name(), entity))
        }
    }

    fn value_sets(&self) -> Result<Vec<ValueSet>> {
        Ok(self
            .variable_entities()?
            .into_iter()
            .map(|entity| ValueSet::new(self.name(), entity))
            .collect())
    }

    fn variable_value_source(&self, name: &str) -> Result<Arc<dyn VariableValueSource>>;

    fn is_view(&self) -> bool {
        false
    }
}

impl<'a> dyn ValueTable + 'a {
    /// Resolve the value of `variable` for `value_set` in this table.
    pub fn value(&self, value_set: &ValueSet, variable: &str) -> Result<Value> {
        let source = self.variable_value_source(variable)?;
        source.value(value_set, self)
    }

    /// Repeated measurements of an occurrence group, ordered by position.
    ///
    /// The number of occurrences is the longest sequence among the group's
    /// variables for this value set.
    pub fn occurrences(&self, value_set: &ValueSet, group: &str) -> Result<Vec<Occurrence>> {
        let mut count = 0;
        for variable in self.variables()? {
            if variable.occurrence_group() != Some(group) {
                continue;
            }
            let value = self.value(value_set, variable.name())?;
            count = count.max(value.size());
        }
        Ok((0..count)
            .map(|order| Occurrence::new(value_set.clone(), group, order))
            .collect())
    }

    /// Value of one variable at an occurrence position. Positions past the
    /// end of the variable's sequence are null.
    pub fn occurrence_value(&self, occurrence: &Occurrence, variable: &str) -> Result<Value> {
        let declared = self.variable(variable)?;
        let value = self.value(occurrence.value_set(), variable)?;
        if !value.is_sequence() {
            return Ok(if occurrence.order() == 0 {
                value
            } else {
                declared.value_type().null_value()
            });
        }
        Ok(value
            .as_sequence()?
            .get(occurrence.order())
            .cloned()
            .unwrap_or_else(|| declared.value_type().null_value()))
    }
}
