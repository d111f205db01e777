//! Declarative view definitions.
//!
//! A [`ViewDefinition`] is the persisted form of a [`View`]: plain data
//! that names the source table and describes each clause. Building it
//! against a datasource compiles scripts and regexes, so every malformed
//! definition fails here rather than on first read.
//!
//! # Example
//!
//! ```ignore
//! let definition = ViewDefinition::new("adults", "people")
//!     .with_where(WhereDefinition::Script { script: "$('age') >= 18".into() })
//!     .with_entity_mapping(EntityMappingDefinition::Prefix {
//!         entity_type: "Subject".into(),
//!         prefix: "S-".into(),
//!     });
//! let view = definition.build(&datasource)?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vtab_filter::{
    EntityIdFilter, ExcludeAllFilter, Filter, FilterAction, IncludeAllFilter, ValueSetFilterChain,
    ValueTypeFilter, VariableAttributeFilter, VariableFilterChain, VariableNameFilter,
    VariableValueFilter,
};
use vtab_model::{Datasource, ValueSet, ValueTable, ValueType, Variable};
use vtab_script::{Script, ScriptFilter};

use crate::clause::{
    AllClause, FilterChainSelectClause, FilterChainWhereClause, NoneClause, ScriptListClause,
};
use crate::error::{Result, ViewError};
use crate::transform::{
    EntityFunction, ExplicitEntityFunction, IdentityFunction, PrefixEntityFunction,
};
use crate::view::View;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewDefinition {
    pub name: String,
    /// Name of the source table in the same datasource. May be another view.
    pub source: String,
    #[serde(default)]
    pub select: SelectDefinition,
    #[serde(default, rename = "where")]
    pub where_clause: WhereDefinition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedVariableDefinition>,
    #[serde(default)]
    pub entity_mapping: EntityMappingDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectDefinition {
    #[default]
    All,
    None,
    /// Exactly the named source variables.
    Variables { names: Vec<String> },
    Filters { filters: Vec<VariableFilterDefinition> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WhereDefinition {
    #[default]
    All,
    None,
    /// Value sets for which the boolean script yields `true`.
    Script { script: String },
    Filters { filters: Vec<ValueSetFilterDefinition> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableFilterDefinition {
    IncludeAll,
    ExcludeAll,
    Name {
        pattern: String,
        #[serde(default)]
        action: FilterAction,
    },
    Attribute {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locale: Option<String>,
        #[serde(default)]
        action: FilterAction,
    },
    ValueType {
        value_types: Vec<ValueType>,
        #[serde(default)]
        action: FilterAction,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSetFilterDefinition {
    IncludeAll,
    ExcludeAll,
    EntityId {
        pattern: String,
        #[serde(default)]
        action: FilterAction,
    },
    Value {
        variable: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default)]
        action: FilterAction,
    },
    Script {
        script: String,
        #[serde(default)]
        action: FilterAction,
    },
}

/// A script-computed variable listed by the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedVariableDefinition {
    pub name: String,
    pub value_type: ValueType,
    pub script: String,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DerivedVariableDefinition {
    pub fn new(name: impl Into<String>, value_type: ValueType, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type,
            script: script.into(),
            repeatable: false,
            unit: None,
        }
    }

    fn to_variable(&self, entity_type: &str) -> Result<Variable> {
        let mut builder = Variable::builder(self.name.as_str(), self.value_type, entity_type)
            .repeatable(self.repeatable)
            .script(self.script.as_str());
        if let Some(unit) = &self.unit {
            builder = builder.unit(unit.as_str());
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierPair {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityMappingDefinition {
    #[default]
    Identity,
    /// `Participant:123` becomes `<entity_type>:<prefix>123`.
    Prefix { entity_type: String, prefix: String },
    Explicit {
        entity_type: String,
        pairs: Vec<IdentifierPair>,
    },
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            select: SelectDefinition::default(),
            where_clause: WhereDefinition::default(),
            derived: Vec::new(),
            entity_mapping: EntityMappingDefinition::default(),
        }
    }

    #[must_use]
    pub fn with_select(mut self, select: SelectDefinition) -> Self {
        self.select = select;
        self
    }

    #[must_use]
    pub fn with_where(mut self, where_clause: WhereDefinition) -> Self {
        self.where_clause = where_clause;
        self
    }

    #[must_use]
    pub fn with_derived(mut self, derived: DerivedVariableDefinition) -> Self {
        self.derived.push(derived);
        self
    }

    #[must_use]
    pub fn with_entity_mapping(mut self, mapping: EntityMappingDefinition) -> Self {
        self.entity_mapping = mapping;
        self
    }

    /// Compile the definition into a view over `datasource`.
    pub fn build(&self, datasource: &dyn Datasource) -> Result<View> {
        if self.name == self.source {
            return Err(ViewError::invalid_definition(
                &self.name,
                "a view cannot be its own source",
            ));
        }
        let source = datasource.value_table(&self.source)?;
        let (entity_type, entities) = self.entity_function(source.as_ref())?;
        let builder = View::builder(self.name.as_str(), Arc::clone(&source))
            .datasource(datasource.name())
            .entity_mapping(entity_type.as_str(), entities);

        let builder = match &self.select {
            SelectDefinition::All => builder.select(AllClause),
            SelectDefinition::None => builder.select(NoneClause),
            SelectDefinition::Variables { names } => {
                builder.select(FilterChainSelectClause::new(self.named_variables(
                    source.as_ref(),
                    names,
                )?))
            }
            SelectDefinition::Filters { filters } => {
                let mut chain = VariableFilterChain::new(format!("{}.select", self.name));
                for filter in filters {
                    chain.push(filter.to_filter()?);
                }
                builder.select(FilterChainSelectClause::new(chain))
            }
        };

        let builder = match &self.where_clause {
            WhereDefinition::All => builder.where_clause(AllClause),
            WhereDefinition::None => builder.where_clause(NoneClause),
            WhereDefinition::Script { script } => {
                let chain = ValueSetFilterChain::new(format!("{}.where", self.name))
                    .with_filter(ExcludeAllFilter)
                    .with_filter(ScriptFilter::new(Script::compile(script)?, FilterAction::Include));
                builder.where_clause(FilterChainWhereClause::new(chain))
            }
            WhereDefinition::Filters { filters } => {
                let mut chain = ValueSetFilterChain::new(format!("{}.where", self.name));
                for filter in filters {
                    chain.push(filter.to_filter()?);
                }
                builder.where_clause(FilterChainWhereClause::new(chain))
            }
        };

        let builder = if self.derived.is_empty() {
            builder
        } else {
            let variables = self
                .derived
                .iter()
                .map(|derived| derived.to_variable(&entity_type))
                .collect::<Result<Vec<_>>>()?;
            builder.list(ScriptListClause::new(&self.name, variables)?)
        };

        builder.build()
    }

    fn entity_function(&self, source: &dyn ValueTable) -> Result<(String, EntityFunction)> {
        let source_type = source.entity_type();
        Ok(match &self.entity_mapping {
            EntityMappingDefinition::Identity => (source_type.to_string(), IdentityFunction::shared()),
            EntityMappingDefinition::Prefix {
                entity_type,
                prefix,
            } => {
                let function: EntityFunction = Arc::new(PrefixEntityFunction::new(
                    source_type,
                    entity_type.as_str(),
                    prefix.as_str(),
                ));
                (entity_type.clone(), function)
            }
            EntityMappingDefinition::Explicit { entity_type, pairs } => {
                let function = ExplicitEntityFunction::new(
                    source_type,
                    entity_type.as_str(),
                    pairs
                        .iter()
                        .map(|pair| (pair.source.clone(), pair.target.clone())),
                )?;
                let function: EntityFunction = Arc::new(function);
                (entity_type.clone(), function)
            }
        })
    }

    fn named_variables(&self, source: &dyn ValueTable, names: &[String]) -> Result<VariableFilterChain> {
        for name in names {
            if !source.has_variable(name)? {
                return Err(ViewError::invalid_definition(
                    &self.name,
                    format!("source '{}' has no variable '{name}'", source.name()),
                ));
            }
        }
        let mut chain =
            VariableFilterChain::new(format!("{}.select", self.name)).with_filter(ExcludeAllFilter);
        if !names.is_empty() {
            let pattern = names
                .iter()
                .map(|name| regex::escape(name))
                .collect::<Vec<_>>()
                .join("|");
            chain = chain.with_filter(VariableNameFilter::new(&pattern, FilterAction::Include)?);
        }
        Ok(chain)
    }
}

impl VariableFilterDefinition {
    fn to_filter(&self) -> Result<Box<dyn Filter<Variable>>> {
        let filter: Box<dyn Filter<Variable>> = match self {
            Self::IncludeAll => Box::new(IncludeAllFilter),
            Self::ExcludeAll => Box::new(ExcludeAllFilter),
            Self::Name { pattern, action } => Box::new(VariableNameFilter::new(pattern, *action)?),
            Self::Attribute {
                name,
                value,
                locale,
                action,
            } => {
                let mut filter = VariableAttributeFilter::new(name.as_str(), *action);
                if let Some(value) = value {
                    filter = filter.with_value(value.as_str());
                }
                if let Some(locale) = locale {
                    filter = filter.with_locale(locale.as_str());
                }
                Box::new(filter)
            }
            Self::ValueType {
                value_types,
                action,
            } => Box::new(ValueTypeFilter::new(value_types.iter().copied(), *action)),
        };
        Ok(filter)
    }
}

impl ValueSetFilterDefinition {
    fn to_filter(&self) -> Result<Box<dyn Filter<ValueSet, dyn ValueTable>>> {
        let filter: Box<dyn Filter<ValueSet, dyn ValueTable>> = match self {
            Self::IncludeAll => Box::new(IncludeAllFilter),
            Self::ExcludeAll => Box::new(ExcludeAllFilter),
            Self::EntityId { pattern, action } => Box::new(EntityIdFilter::new(pattern, *action)?),
            Self::Value {
                variable,
                value,
                action,
            } => Box::new(VariableValueFilter::new(variable.as_str(), value.clone(), *action)),
            Self::Script { script, action } => {
                Box::new(ScriptFilter::new(Script::compile(script)?, *action))
            }
        };
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_clauses() {
        let definition: ViewDefinition =
            serde_json::from_str(r#"{"name": "all_people", "source": "people"}"#).expect("parse");
        assert_eq!(definition, ViewDefinition::new("all_people", "people"));
    }

    #[test]
    fn tagged_clauses_parse() {
        let json = r#"{
            "name": "subjects",
            "source": "people",
            "select": {"kind": "filters", "filters": [
                {"type": "exclude_all"},
                {"type": "name", "pattern": "age|sex", "action": "include"}
            ]},
            "where": {"kind": "script", "script": "$('age') >= 18"},
            "derived": [{"name": "decade", "value_type": "integer", "script": "$('age') / 10"}],
            "entity_mapping": {"kind": "prefix", "entity_type": "Subject", "prefix": "S-"}
        }"#;
        let definition: ViewDefinition = serde_json::from_str(json).expect("parse");
        assert!(matches!(definition.select, SelectDefinition::Filters { ref filters } if filters.len() == 2));
        assert!(matches!(definition.where_clause, WhereDefinition::Script { .. }));
        assert_eq!(definition.derived[0].value_type, ValueType::Integer);
        assert!(matches!(
            definition.entity_mapping,
            EntityMappingDefinition::Prefix { ref prefix, .. } if prefix == "S-"
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<ViewDefinition, _> =
            serde_json::from_str(r#"{"name": "v", "source": "t", "filter": {}}"#);
        assert!(result.is_err());
    }
}
