//! Reversible mappings between a transforming table and its source.
//!
//! A [`TransformingValueTable`] exposes three bijections: entities, value
//! sets and variable value sources. The value set mapping always routes its
//! entity resolution through the entity mapping, so the three stay
//! consistent by construction.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use bimap::BiMap;

use vtab_model::{ValueSet, ValueTable, Variable, VariableEntity, VariableValueSource};

use crate::error::{Result, ViewError};

/// An invertible mapping. Both directions fail with
/// [`ViewError::KeyNotFound`] outside the function's domain.
pub trait BijectiveFunction<F, T>: Send + Sync {
    fn apply(&self, from: &F) -> Result<T>;

    fn unapply(&self, to: &T) -> Result<F>;
}

pub type EntityFunction = Arc<dyn BijectiveFunction<VariableEntity, VariableEntity>>;

/// Maps every value to itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFunction;

impl IdentityFunction {
    /// Shared instance used by every untransformed view.
    pub fn shared() -> EntityFunction {
        static SHARED: OnceLock<EntityFunction> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(IdentityFunction)))
    }
}

impl<T: Clone> BijectiveFunction<T, T> for IdentityFunction {
    fn apply(&self, from: &T) -> Result<T> {
        Ok(from.clone())
    }

    fn unapply(&self, to: &T) -> Result<T> {
        Ok(to.clone())
    }
}

/// A bijection backed by an explicit two-way map.
#[derive(Debug, Clone)]
pub struct MapFunction<F, T>
where
    F: Eq + Hash,
    T: Eq + Hash,
{
    map: BiMap<F, T>,
}

impl<F, T> MapFunction<F, T>
where
    F: Eq + Hash + fmt::Display,
    T: Eq + Hash + fmt::Display,
{
    /// Fails with [`ViewError::NonInjectiveMapping`] when a key or a value
    /// appears twice.
    pub fn new(pairs: impl IntoIterator<Item = (F, T)>) -> Result<Self> {
        let mut map = BiMap::new();
        for (from, to) in pairs {
            let key = if map.contains_left(&from) {
                from.to_string()
            } else {
                to.to_string()
            };
            if map.insert_no_overwrite(from, to).is_err() {
                return Err(ViewError::NonInjectiveMapping { key });
            }
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<F, T> BijectiveFunction<F, T> for MapFunction<F, T>
where
    F: Eq + Hash + Clone + fmt::Display + Send + Sync,
    T: Eq + Hash + Clone + fmt::Display + Send + Sync,
{
    fn apply(&self, from: &F) -> Result<T> {
        self.map
            .get_by_left(from)
            .cloned()
            .ok_or_else(|| ViewError::KeyNotFound {
                key: from.to_string(),
            })
    }

    fn unapply(&self, to: &T) -> Result<F> {
        self.map
            .get_by_right(to)
            .cloned()
            .ok_or_else(|| ViewError::KeyNotFound {
                key: to.to_string(),
            })
    }
}

/// Re-keys entities of one type into another type with an identifier
/// prefix: `Participant:123` becomes `Subject:S-123` with prefix `S-`.
#[derive(Debug, Clone)]
pub struct PrefixEntityFunction {
    source_type: String,
    target_type: String,
    prefix: String,
}

impl PrefixEntityFunction {
    pub fn new(
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            prefix: prefix.into(),
        }
    }
}

impl BijectiveFunction<VariableEntity, VariableEntity> for PrefixEntityFunction {
    fn apply(&self, from: &VariableEntity) -> Result<VariableEntity> {
        if from.entity_type() != self.source_type {
            return Err(ViewError::KeyNotFound {
                key: from.to_string(),
            });
        }
        Ok(VariableEntity::new(
            self.target_type.as_str(),
            format!("{}{}", self.prefix, from.identifier()),
        ))
    }

    fn unapply(&self, to: &VariableEntity) -> Result<VariableEntity> {
        let identifier = (to.entity_type() == self.target_type)
            .then(|| to.identifier().strip_prefix(self.prefix.as_str()))
            .flatten()
            .ok_or_else(|| ViewError::KeyNotFound {
                key: to.to_string(),
            })?;
        Ok(VariableEntity::new(self.source_type.as_str(), identifier))
    }
}

/// Explicit identifier pairs between two entity types.
#[derive(Debug, Clone)]
pub struct ExplicitEntityFunction {
    source_type: String,
    target_type: String,
    identifiers: MapFunction<String, String>,
}

impl ExplicitEntityFunction {
    pub fn new(
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        pairs: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        Ok(Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            identifiers: MapFunction::new(pairs)?,
        })
    }
}

impl BijectiveFunction<VariableEntity, VariableEntity> for ExplicitEntityFunction {
    fn apply(&self, from: &VariableEntity) -> Result<VariableEntity> {
        if from.entity_type() != self.source_type {
            return Err(ViewError::KeyNotFound {
                key: from.to_string(),
            });
        }
        let identifier = self
            .identifiers
            .apply(&from.identifier().to_string())
            .map_err(|_| ViewError::KeyNotFound {
                key: from.to_string(),
            })?;
        Ok(VariableEntity::new(self.target_type.as_str(), identifier))
    }

    fn unapply(&self, to: &VariableEntity) -> Result<VariableEntity> {
        if to.entity_type() != self.target_type {
            return Err(ViewError::KeyNotFound {
                key: to.to_string(),
            });
        }
        let identifier = self
            .identifiers
            .unapply(&to.identifier().to_string())
            .map_err(|_| ViewError::KeyNotFound {
                key: to.to_string(),
            })?;
        Ok(VariableEntity::new(self.source_type.as_str(), identifier))
    }
}

/// Maps source value sets to value sets of the transforming table.
#[derive(Clone)]
pub struct ValueSetFunction {
    source_table: Arc<str>,
    table: Arc<str>,
    entities: EntityFunction,
}

impl ValueSetFunction {
    pub fn new(source_table: &str, table: &str, entities: EntityFunction) -> Self {
        Self {
            source_table: Arc::from(source_table),
            table: Arc::from(table),
            entities,
        }
    }
}

impl BijectiveFunction<ValueSet, ValueSet> for ValueSetFunction {
    fn apply(&self, from: &ValueSet) -> Result<ValueSet> {
        let entity = self.entities.apply(from.entity())?;
        Ok(ValueSet::new(Arc::clone(&self.table), entity))
    }

    fn unapply(&self, to: &ValueSet) -> Result<ValueSet> {
        let entity = self.entities.unapply(to.entity())?;
        Ok(ValueSet::new(Arc::clone(&self.source_table), entity))
    }
}

impl fmt::Debug for ValueSetFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSetFunction")
            .field("source_table", &self.source_table)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// A source column seen through a transforming table.
///
/// The exposed variable carries the transforming table's entity type.
/// Values are read by mapping the value set back to the source.
pub struct TransformedValueSource {
    variable: Variable,
    inner: Arc<dyn VariableValueSource>,
    source: Arc<dyn ValueTable>,
    value_sets: ValueSetFunction,
}

impl VariableValueSource for TransformedValueSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    fn value(&self, value_set: &ValueSet, _table: &dyn ValueTable) -> vtab_model::Result<vtab_model::Value> {
        let source_value_set = self.value_sets.unapply(value_set).map_err(|err| match err {
            ViewError::KeyNotFound { .. } => {
                vtab_model::ModelError::no_such_value_set(value_set.table_name(), value_set.entity())
            }
            other => other.into(),
        })?;
        self.inner.value(&source_value_set, self.source.as_ref())
    }

    fn wrapped(&self) -> Option<&Arc<dyn VariableValueSource>> {
        Some(&self.inner)
    }
}

impl fmt::Debug for TransformedValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformedValueSource")
            .field("variable", &self.variable.name())
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

/// Wraps source value sources for a transforming table and unwraps them.
#[derive(Clone)]
pub struct ValueSourceFunction {
    source: Arc<dyn ValueTable>,
    entity_type: String,
    value_sets: ValueSetFunction,
}

impl ValueSourceFunction {
    pub fn new(source: Arc<dyn ValueTable>, entity_type: &str, value_sets: ValueSetFunction) -> Self {
        Self {
            source,
            entity_type: entity_type.to_string(),
            value_sets,
        }
    }
}

impl BijectiveFunction<Arc<dyn VariableValueSource>, Arc<dyn VariableValueSource>>
    for ValueSourceFunction
{
    fn apply(&self, from: &Arc<dyn VariableValueSource>) -> Result<Arc<dyn VariableValueSource>> {
        let variable = from
            .variable()
            .to_builder()
            .entity_type(self.entity_type.as_str())
            .build()?;
        Ok(Arc::new(TransformedValueSource {
            variable,
            inner: Arc::clone(from),
            source: Arc::clone(&self.source),
            value_sets: self.value_sets.clone(),
        }))
    }

    fn unapply(&self, to: &Arc<dyn VariableValueSource>) -> Result<Arc<dyn VariableValueSource>> {
        to.wrapped().cloned().ok_or_else(|| ViewError::KeyNotFound {
            key: to.variable().name().to_string(),
        })
    }
}

/// A value table derived from a source table through reversible mappings.
pub trait TransformingValueTable: ValueTable {
    fn source(&self) -> &Arc<dyn ValueTable>;

    fn entity_function(&self) -> &EntityFunction;

    fn value_set_function(&self) -> ValueSetFunction {
        ValueSetFunction::new(
            self.source().name(),
            self.name(),
            Arc::clone(self.entity_function()),
        )
    }

    fn value_source_function(&self) -> ValueSourceFunction {
        ValueSourceFunction::new(
            Arc::clone(self.source()),
            self.entity_type(),
            self.value_set_function(),
        )
    }
}
