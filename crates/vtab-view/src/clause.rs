//! Select, where and list clauses.
//!
//! A [`View`](crate::View) is parameterised by one of each: the select
//! clause decides which source variables are visible, the where clause
//! which value sets, and the list clause supplies extra computed
//! variables. [`AllClause`] and [`NoneClause`] implement all three.

use std::sync::Arc;

use tracing::debug;

use vtab_filter::{ValueSetFilterChain, VariableFilterChain};
use vtab_model::{
    ModelError, ValueSet, ValueTable, Variable, VariableValueSource, VariableWriter,
};
use vtab_script::ScriptVariableValueSource;

use crate::error::{Result, ViewError};

/// Decides whether a source variable is visible in a view.
pub trait SelectClause: Send + Sync {
    fn select(&self, variable: &Variable) -> Result<bool>;
}

/// Decides whether a value set is visible in a view.
///
/// `table` is the view itself, so the clause can read any of its variables
/// for the value set being tested.
pub trait WhereClause: Send + Sync {
    fn admits(&self, value_set: &ValueSet, table: &(dyn ValueTable + 'static)) -> Result<bool>;
}

/// Supplies variables that do not exist in the source table.
pub trait ListClause: Send + Sync {
    fn variable_value_sources(&self) -> Vec<Arc<dyn VariableValueSource>>;

    fn variable_value_source(&self, name: &str) -> Result<Arc<dyn VariableValueSource>> {
        self.variable_value_sources()
            .into_iter()
            .find(|source| source.variable().name() == name)
            .ok_or_else(|| ModelError::no_such_variable("list clause", name).into())
    }

    fn variables(&self) -> Vec<Variable> {
        self.variable_value_sources()
            .iter()
            .map(|source| source.variable().clone())
            .collect()
    }

    /// Writer for adding or removing listed variables.
    fn create_writer(&self) -> Result<Box<dyn VariableWriter>> {
        Err(ModelError::unsupported("list clause variables cannot be written").into())
    }
}

/// Admits every variable and value set and lists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllClause;

impl SelectClause for AllClause {
    fn select(&self, _variable: &Variable) -> Result<bool> {
        Ok(true)
    }
}

impl WhereClause for AllClause {
    fn admits(&self, _value_set: &ValueSet, _table: &(dyn ValueTable + 'static)) -> Result<bool> {
        Ok(true)
    }
}

impl ListClause for AllClause {
    fn variable_value_sources(&self) -> Vec<Arc<dyn VariableValueSource>> {
        Vec::new()
    }
}

/// Admits nothing and lists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneClause;

impl SelectClause for NoneClause {
    fn select(&self, _variable: &Variable) -> Result<bool> {
        Ok(false)
    }
}

impl WhereClause for NoneClause {
    fn admits(&self, _value_set: &ValueSet, _table: &(dyn ValueTable + 'static)) -> Result<bool> {
        Ok(false)
    }
}

impl ListClause for NoneClause {
    fn variable_value_sources(&self) -> Vec<Arc<dyn VariableValueSource>> {
        Vec::new()
    }
}

/// Selects the variables a filter chain keeps.
#[derive(Debug)]
pub struct FilterChainSelectClause {
    chain: VariableFilterChain,
}

impl FilterChainSelectClause {
    pub fn new(chain: VariableFilterChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &VariableFilterChain {
        &self.chain
    }
}

impl SelectClause for FilterChainSelectClause {
    fn select(&self, variable: &Variable) -> Result<bool> {
        Ok(self.chain.accepts(variable.clone(), &())?)
    }
}

/// Admits the value sets a filter chain keeps.
#[derive(Debug)]
pub struct FilterChainWhereClause {
    chain: ValueSetFilterChain,
}

impl FilterChainWhereClause {
    pub fn new(chain: ValueSetFilterChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &ValueSetFilterChain {
        &self.chain
    }
}

impl WhereClause for FilterChainWhereClause {
    fn admits(&self, value_set: &ValueSet, table: &(dyn ValueTable + 'static)) -> Result<bool> {
        Ok(self.chain.accepts(value_set.clone(), table)?)
    }
}

/// Lists script-computed variables.
///
/// The set is fixed at construction: derived variables change by replacing
/// the view.
#[derive(Debug, Clone, Default)]
pub struct ScriptListClause {
    sources: Vec<Arc<dyn VariableValueSource>>,
}

impl ScriptListClause {
    /// Compile the `script` attribute of every variable.
    ///
    /// Duplicate names are an [`ViewError::InvalidDefinition`] against
    /// `view`.
    pub fn new(view: &str, variables: impl IntoIterator<Item = Variable>) -> Result<Self> {
        let mut sources: Vec<Arc<dyn VariableValueSource>> = Vec::new();
        for variable in variables {
            if sources
                .iter()
                .any(|source| source.variable().name() == variable.name())
            {
                return Err(ViewError::invalid_definition(
                    view,
                    format!("derived variable '{}' is declared twice", variable.name()),
                ));
            }
            let source = ScriptVariableValueSource::from_variable(variable)?;
            debug!(view, variable = %source.variable().name(), script = %source.script(), "compiled derived variable");
            sources.push(Arc::new(source));
        }
        Ok(Self { sources })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ListClause for ScriptListClause {
    fn variable_value_sources(&self) -> Vec<Arc<dyn VariableValueSource>> {
        self.sources.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtab_filter::{ExcludeAllFilter, FilterAction, VariableNameFilter};
    use vtab_model::{MemoryDatasource, ValueType, VariableEntity};

    fn variable(name: &str) -> Variable {
        Variable::builder(name, ValueType::Integer, "Participant")
            .build()
            .expect("variable")
    }

    #[test]
    fn all_and_none_are_opposites() {
        let datasource = MemoryDatasource::new("study");
        let table = datasource.create_table("people", "Participant").expect("table");
        let context: &(dyn ValueTable + 'static) = &*table;
        let value_set = ValueSet::new("people", VariableEntity::new("Participant", "1"));
        assert!(AllClause.select(&variable("a")).expect("select"));
        assert!(AllClause.admits(&value_set, context).expect("admits"));
        assert!(!NoneClause.select(&variable("a")).expect("select"));
        assert!(!NoneClause.admits(&value_set, context).expect("admits"));
        assert!(NoneClause.variables().is_empty());
    }

    #[test]
    fn none_clause_has_no_sources() {
        let err = NoneClause.variable_value_source("anything").unwrap_err();
        assert!(matches!(
            err,
            ViewError::Model(ModelError::NoSuchVariable { ref variable, .. }) if variable == "anything"
        ));
        let Err(err) = NoneClause.create_writer() else {
            panic!("list clause writers are unsupported");
        };
        assert!(matches!(err, ViewError::Model(ModelError::UnsupportedOperation(_))));
    }

    #[test]
    fn chain_select_follows_chain() {
        let chain = VariableFilterChain::new("ac")
            .with_filter(ExcludeAllFilter)
            .with_filter(VariableNameFilter::new("A|C", FilterAction::Include).expect("filter"));
        let clause = FilterChainSelectClause::new(chain);
        assert!(clause.select(&variable("A")).expect("select"));
        assert!(!clause.select(&variable("B")).expect("select"));
    }

    #[test]
    fn script_list_rejects_duplicates() {
        let derived = || {
            Variable::builder("two", ValueType::Integer, "Participant")
                .script("1 + 1")
                .build()
                .expect("variable")
        };
        let err = ScriptListClause::new("v", [derived(), derived()]).unwrap_err();
        assert!(matches!(err, ViewError::InvalidDefinition { ref view, .. } if view == "v"));
        let clause = ScriptListClause::new("v", [derived()]).expect("clause");
        assert_eq!(clause.len(), 1);
        assert_eq!(clause.variable_value_source("two").expect("source").variable().name(), "two");
    }
}
