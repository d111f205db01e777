//! Views: virtual tables derived from a source table.
//!
//! A [`View`] holds no data. Its variables are the selected source
//! variables plus the list clause's variables, its value sets are the
//! source value sets the where clause admits, and entities are renamed
//! through the view's entity mapping.
//!
//! # Example
//!
//! ```ignore
//! let view = View::builder("adults", source)
//!     .select(FilterChainSelectClause::new(chain))
//!     .where_clause(AllClause)
//!     .build()?;
//! let entities = view.variable_entities()?;
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use vtab_model::{
    ModelError, ValueSet, ValueTable, Variable, VariableEntity, VariableValueSource,
};

use crate::clause::{AllClause, ListClause, NoneClause, SelectClause, WhereClause};
use crate::error::{Result, ViewError};
use crate::transform::{
    BijectiveFunction, EntityFunction, IdentityFunction, TransformingValueTable,
};

pub struct View {
    name: String,
    datasource: String,
    entity_type: String,
    source: Arc<dyn ValueTable>,
    select: Arc<dyn SelectClause>,
    where_clause: Arc<dyn WhereClause>,
    list: Arc<dyn ListClause>,
    entities: EntityFunction,
}

impl View {
    /// A view named `name` over `source`. Everything is selected and
    /// admitted, nothing is listed and entities keep their identity until
    /// the builder says otherwise.
    pub fn builder(name: impl Into<String>, source: Arc<dyn ValueTable>) -> ViewBuilder {
        ViewBuilder {
            name: name.into(),
            datasource: source.datasource_name().to_string(),
            entity_type: source.entity_type().to_string(),
            source,
            select: Arc::new(AllClause),
            where_clause: Arc::new(AllClause),
            list: Arc::new(NoneClause),
            entities: IdentityFunction::shared(),
        }
    }

    pub fn select_clause(&self) -> &Arc<dyn SelectClause> {
        &self.select
    }

    pub fn where_clause(&self) -> &Arc<dyn WhereClause> {
        &self.where_clause
    }

    pub fn list_clause(&self) -> &Arc<dyn ListClause> {
        &self.list
    }

    fn as_context(&self) -> &(dyn ValueTable + 'static) {
        self
    }

    fn admits(&self, entity: VariableEntity) -> Result<bool> {
        let value_set = ValueSet::new(self.name.as_str(), entity);
        self.where_clause.admits(&value_set, self.as_context())
    }

    fn selected_variables(&self) -> Result<Vec<Variable>> {
        let mut selected = Vec::new();
        for variable in self.source.variables()? {
            if self.select.select(&variable)? {
                selected.push(
                    variable
                        .to_builder()
                        .entity_type(self.entity_type.as_str())
                        .build()?,
                );
            }
        }
        Ok(selected)
    }

    fn listed_source(&self, name: &str) -> Result<Option<Arc<dyn VariableValueSource>>> {
        match self.list.variable_value_source(name) {
            Ok(source) => Ok(Some(source)),
            Err(ViewError::Model(ModelError::NoSuchVariable { .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn selected_source(&self, name: &str) -> Result<Arc<dyn VariableValueSource>> {
        let variable = match self.source.variable(name) {
            Ok(variable) => variable,
            Err(ModelError::NoSuchVariable { .. }) => {
                return Err(ModelError::no_such_variable(&self.name, name).into());
            }
            Err(err) => return Err(err.into()),
        };
        if !self.select.select(&variable)? {
            return Err(ModelError::no_such_variable(&self.name, name).into());
        }
        let inner = self.source.variable_value_source(name)?;
        self.value_source_function().apply(&inner)
    }
}

impl ValueTable for View {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn datasource_name(&self) -> &str {
        &self.datasource
    }

    /// Selected source variables followed by the listed ones. A listed
    /// variable hides a selected variable of the same name.
    fn variables(&self) -> vtab_model::Result<Vec<Variable>> {
        let listed = self.list.variables();
        let mut variables: Vec<Variable> = self
            .selected_variables()?
            .into_iter()
            .filter(|variable| !listed.iter().any(|other| other.name() == variable.name()))
            .collect();
        variables.extend(listed);
        Ok(variables)
    }

    fn variable_entities(&self) -> vtab_model::Result<BTreeSet<VariableEntity>> {
        let mut entities = BTreeSet::new();
        let mut unmapped = 0usize;
        for source_entity in self.source.variable_entities()? {
            let entity = match self.entities.apply(&source_entity) {
                Ok(entity) => entity,
                Err(ViewError::KeyNotFound { .. }) => {
                    unmapped += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if self.admits(entity.clone())? {
                entities.insert(entity);
            }
        }
        debug!(
            view = %self.name,
            source = %self.source.name(),
            admitted = entities.len(),
            unmapped,
            "evaluated view entities"
        );
        Ok(entities)
    }

    fn has_value_set(&self, entity: &VariableEntity) -> vtab_model::Result<bool> {
        let source_entity = match self.entities.unapply(entity) {
            Ok(source_entity) => source_entity,
            Err(ViewError::KeyNotFound { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if !self.source.has_value_set(&source_entity)? {
            return Ok(false);
        }
        Ok(self.admits(entity.clone())?)
    }

    fn variable_value_source(&self, name: &str) -> vtab_model::Result<Arc<dyn VariableValueSource>> {
        if let Some(source) = self.listed_source(name)? {
            return Ok(source);
        }
        Ok(self.selected_source(name)?)
    }

    fn is_view(&self) -> bool {
        true
    }
}

impl TransformingValueTable for View {
    fn source(&self) -> &Arc<dyn ValueTable> {
        &self.source
    }

    fn entity_function(&self) -> &EntityFunction {
        &self.entities
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("datasource", &self.datasource)
            .field("entity_type", &self.entity_type)
            .field("source", &self.source.name())
            .finish_non_exhaustive()
    }
}

pub struct ViewBuilder {
    name: String,
    datasource: String,
    entity_type: String,
    source: Arc<dyn ValueTable>,
    select: Arc<dyn SelectClause>,
    where_clause: Arc<dyn WhereClause>,
    list: Arc<dyn ListClause>,
    entities: EntityFunction,
}

impl ViewBuilder {
    /// Datasource the view is registered in. Defaults to the source's.
    #[must_use]
    pub fn datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = datasource.into();
        self
    }

    #[must_use]
    pub fn select(mut self, clause: impl SelectClause + 'static) -> Self {
        self.select = Arc::new(clause);
        self
    }

    #[must_use]
    pub fn where_clause(mut self, clause: impl WhereClause + 'static) -> Self {
        self.where_clause = Arc::new(clause);
        self
    }

    #[must_use]
    pub fn list(mut self, clause: impl ListClause + 'static) -> Self {
        self.list = Arc::new(clause);
        self
    }

    /// Rename entities into `entity_type` through `function`.
    #[must_use]
    pub fn entity_mapping(mut self, entity_type: impl Into<String>, function: EntityFunction) -> Self {
        self.entity_type = entity_type.into();
        self.entities = function;
        self
    }

    pub fn build(self) -> Result<View> {
        if self.name.trim().is_empty() {
            return Err(ViewError::invalid_definition(self.name, "view name is blank"));
        }
        if self.entity_type.trim().is_empty() {
            return Err(ViewError::invalid_definition(self.name, "entity type is blank"));
        }
        debug!(view = %self.name, source = %self.source.name(), entity_type = %self.entity_type, "built view");
        Ok(View {
            name: self.name,
            datasource: self.datasource,
            entity_type: self.entity_type,
            source: self.source,
            select: self.select,
            where_clause: self.where_clause,
            list: self.list,
            entities: self.entities,
        })
    }
}
