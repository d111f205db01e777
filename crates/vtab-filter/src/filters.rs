//! Stock filters for variables and value sets.
//!
//! Predicate filters pair a test with a [`FilterAction`] that decides what
//! a match does to the item's state.

use regex::Regex;
use serde::{Deserialize, Serialize};

use vtab_model::{ValueSet, ValueTable, ValueType, Variable};

use crate::chain::Filter;
use crate::error::{FilterError, Result};
use crate::state::{FilterState, StateEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    /// Re-admit a matching item that a previous filter excluded.
    #[default]
    Include,
    Exclude,
    Discard,
}

/// Apply `action` to an envelope whose item matched a predicate.
pub fn apply_action<T>(envelope: &mut StateEnvelope<T>, action: FilterAction) -> Result<()> {
    let next = match (action, envelope.state()) {
        (_, FilterState::Discarded) => return Ok(()),
        (FilterAction::Include, FilterState::Out) => FilterState::In,
        (FilterAction::Exclude, FilterState::In) => FilterState::Out,
        (FilterAction::Discard, _) => FilterState::Discarded,
        _ => return Ok(()),
    };
    envelope.set_state(next)
}

/// Compile a pattern that must match the whole input.
fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Moves every `Out` item back `In`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAllFilter;

impl<T, C: ?Sized> Filter<T, C> for IncludeAllFilter {
    fn apply(&self, envelope: &mut StateEnvelope<T>, _context: &C) -> Result<()> {
        apply_action(envelope, FilterAction::Include)
    }
}

/// Moves every `In` item `Out`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeAllFilter;

impl<T, C: ?Sized> Filter<T, C> for ExcludeAllFilter {
    fn apply(&self, envelope: &mut StateEnvelope<T>, _context: &C) -> Result<()> {
        apply_action(envelope, FilterAction::Exclude)
    }
}

/// Matches variables whose whole name matches a regular expression.
#[derive(Debug, Clone)]
pub struct VariableNameFilter {
    pattern: Regex,
    action: FilterAction,
}

impl VariableNameFilter {
    pub fn new(pattern: &str, action: FilterAction) -> Result<Self> {
        Ok(Self {
            pattern: anchored(pattern)?,
            action,
        })
    }
}

impl Filter<Variable> for VariableNameFilter {
    fn apply(&self, envelope: &mut StateEnvelope<Variable>, _context: &()) -> Result<()> {
        if self.pattern.is_match(envelope.item().name()) {
            apply_action(envelope, self.action)?;
        }
        Ok(())
    }
}

/// Matches variables carrying an attribute, optionally with a given text.
#[derive(Debug, Clone)]
pub struct VariableAttributeFilter {
    name: String,
    locale: Option<String>,
    value: Option<String>,
    action: FilterAction,
}

impl VariableAttributeFilter {
    pub fn new(name: impl Into<String>, action: FilterAction) -> Self {
        Self {
            name: name.into(),
            locale: None,
            value: None,
            action,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    fn matches(&self, variable: &Variable) -> bool {
        variable
            .attributes()
            .iter()
            .filter(|attribute| attribute.name == self.name)
            .filter(|attribute| self.locale.is_none() || attribute.locale == self.locale)
            .any(|attribute| match &self.value {
                Some(expected) => attribute.value.to_text().as_deref() == Some(expected.as_str()),
                None => true,
            })
    }
}

impl Filter<Variable> for VariableAttributeFilter {
    fn apply(&self, envelope: &mut StateEnvelope<Variable>, _context: &()) -> Result<()> {
        if self.matches(envelope.item()) {
            apply_action(envelope, self.action)?;
        }
        Ok(())
    }
}

/// Matches variables of any of the listed value types.
#[derive(Debug, Clone)]
pub struct ValueTypeFilter {
    value_types: Vec<ValueType>,
    action: FilterAction,
}

impl ValueTypeFilter {
    pub fn new(value_types: impl IntoIterator<Item = ValueType>, action: FilterAction) -> Self {
        Self {
            value_types: value_types.into_iter().collect(),
            action,
        }
    }
}

impl Filter<Variable> for ValueTypeFilter {
    fn apply(&self, envelope: &mut StateEnvelope<Variable>, _context: &()) -> Result<()> {
        if self.value_types.contains(&envelope.item().value_type()) {
            apply_action(envelope, self.action)?;
        }
        Ok(())
    }
}

/// Matches value sets whose entity identifier matches a regular expression.
#[derive(Debug, Clone)]
pub struct EntityIdFilter {
    pattern: Regex,
    action: FilterAction,
}

impl EntityIdFilter {
    pub fn new(pattern: &str, action: FilterAction) -> Result<Self> {
        Ok(Self {
            pattern: anchored(pattern)?,
            action,
        })
    }
}

impl Filter<ValueSet, dyn ValueTable> for EntityIdFilter {
    fn apply(
        &self,
        envelope: &mut StateEnvelope<ValueSet>,
        _table: &(dyn ValueTable + 'static),
    ) -> Result<()> {
        if self.pattern.is_match(envelope.item().entity().identifier()) {
            apply_action(envelope, self.action)?;
        }
        Ok(())
    }
}

/// Matches value sets where a variable's text form equals an expected text.
///
/// A null value matches only when no expected text is given.
#[derive(Debug, Clone)]
pub struct VariableValueFilter {
    variable: String,
    expected: Option<String>,
    action: FilterAction,
}

impl VariableValueFilter {
    pub fn new(
        variable: impl Into<String>,
        expected: Option<String>,
        action: FilterAction,
    ) -> Self {
        Self {
            variable: variable.into(),
            expected,
            action,
        }
    }
}

impl Filter<ValueSet, dyn ValueTable> for VariableValueFilter {
    fn apply(
        &self,
        envelope: &mut StateEnvelope<ValueSet>,
        table: &(dyn ValueTable + 'static),
    ) -> Result<()> {
        if envelope.state().is_terminal() {
            return Ok(());
        }
        let value = table.value(envelope.item(), &self.variable)?;
        if value.to_text() == self.expected {
            apply_action(envelope, self.action)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::FilterChain;

    fn variable(name: &str, value_type: ValueType) -> Variable {
        Variable::builder(name, value_type, "Participant")
            .build()
            .expect("variable")
    }

    #[test]
    fn include_readmits_excluded_items() {
        let chain = FilterChain::<Variable>::new("ages")
            .with_filter(ExcludeAllFilter)
            .with_filter(
                VariableNameFilter::new("age.*", FilterAction::Include).expect("pattern"),
            );
        let names: Vec<String> = chain
            .filter(
                [
                    variable("age", ValueType::Integer),
                    variable("sex", ValueType::Text),
                    variable("age_group", ValueType::Text),
                ],
                &(),
            )
            .expect("filter")
            .iter()
            .map(|v| v.name().to_string())
            .collect();
        assert_eq!(names, ["age", "age_group"]);
    }

    #[test]
    fn discard_cannot_be_undone() {
        let chain = FilterChain::<Variable>::new("no text")
            .with_filter(ValueTypeFilter::new([ValueType::Text], FilterAction::Discard))
            .with_filter(IncludeAllFilter);
        assert!(!chain.accepts(variable("sex", ValueType::Text), &()).expect("accepts"));
        assert!(chain.accepts(variable("age", ValueType::Integer), &()).expect("accepts"));
    }

    #[test]
    fn name_pattern_is_anchored() {
        let filter = VariableNameFilter::new("age", FilterAction::Exclude).expect("pattern");
        let chain = FilterChain::<Variable>::new("anchored").with_filter(filter);
        assert!(chain.accepts(variable("stage", ValueType::Text), &()).expect("accepts"));
        assert!(!chain.accepts(variable("age", ValueType::Text), &()).expect("accepts"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = VariableNameFilter::new("(", FilterAction::Include).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { pattern, .. } if pattern == "("));
    }
}
