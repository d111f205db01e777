//! Variable descriptors and their builder.
//!
//! A [`Variable`] is immutable once built. Deriving a modified variable goes
//! through [`Variable::to_builder`], which yields a new value.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::Value;
use crate::value_type::ValueType;

/// Attribute holding the expression of a script-derived variable.
pub const SCRIPT_ATTRIBUTE: &str = "script";

/// A metadata entry keyed by `(name, locale)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub value: Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            locale: None,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// One allowed value of a categorical variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub missing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            missing: false,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Typed column descriptor.
///
/// Fields are private and only reachable through getters so a built
/// variable cannot change underneath the tables sharing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    value_type: ValueType,
    entity_type: String,
    #[serde(default)]
    repeatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    occurrence_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    categories: Vec<Category>,
}

impl Variable {
    pub fn builder(
        name: impl Into<String>,
        value_type: ValueType,
        entity_type: impl Into<String>,
    ) -> VariableBuilder {
        VariableBuilder {
            variable: Variable {
                name: name.into(),
                value_type,
                entity_type: entity_type.into(),
                repeatable: false,
                occurrence_group: None,
                unit: None,
                mime_type: None,
                reference_entity_type: None,
                attributes: Vec::new(),
                categories: Vec::new(),
            },
        }
    }

    /// Start a builder seeded with this variable's fields.
    pub fn to_builder(&self) -> VariableBuilder {
        VariableBuilder {
            variable: self.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn occurrence_group(&self) -> Option<&str> {
        self.occurrence_group.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn reference_entity_type(&self) -> Option<&str> {
        self.reference_entity_type.as_deref()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Attribute with an exact `(name, locale)` match.
    pub fn attribute(&self, name: &str, locale: Option<&str>) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name && attribute.locale.as_deref() == locale)
    }

    /// True when an attribute with this name exists in any locale.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| attribute.name == name)
    }

    /// Text of the first attribute with this name, preferring the
    /// locale-less entry.
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.attribute(name, None)
            .or_else(|| self.attributes.iter().find(|attribute| attribute.name == name))
            .and_then(|attribute| attribute.value.to_text())
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.name == name)
    }

    /// True when the value's text names a category flagged as missing.
    pub fn is_missing_code(&self, value: &Value) -> bool {
        let Some(text) = value.to_text() else {
            return false;
        };
        self.category(&text).is_some_and(|category| category.missing)
    }

    /// Null value shaped for this variable: a null sequence when repeatable.
    pub fn null_value(&self) -> Value {
        if self.repeatable {
            self.value_type.null_sequence()
        } else {
            self.value_type.null_value()
        }
    }
}

/// Builder for [`Variable`]; [`VariableBuilder::build`] validates names.
#[derive(Debug, Clone)]
pub struct VariableBuilder {
    variable: Variable,
}

impl VariableBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.variable.name = name.into();
        self
    }

    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.variable.value_type = value_type;
        self
    }

    #[must_use]
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.variable.entity_type = entity_type.into();
        self
    }

    #[must_use]
    pub fn repeatable(mut self, repeatable: bool) -> Self {
        self.variable.repeatable = repeatable;
        self
    }

    #[must_use]
    pub fn occurrence_group(mut self, group: impl Into<String>) -> Self {
        self.variable.occurrence_group = Some(group.into());
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.variable.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.variable.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn reference_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.variable.reference_entity_type = Some(entity_type.into());
        self
    }

    /// Add an attribute, replacing any entry with the same `(name, locale)`.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.variable
            .attributes
            .retain(|existing| existing.name != attribute.name || existing.locale != attribute.locale);
        self.variable.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.variable.categories.push(category);
        self
    }

    /// Shorthand for the `script` attribute of a derived variable.
    #[must_use]
    pub fn script(self, expression: impl Into<String>) -> Self {
        self.attribute(Attribute::new(SCRIPT_ATTRIBUTE, Value::text(expression)))
    }

    pub fn build(self) -> Result<Variable> {
        let variable = self.variable;
        validate_name("variable", &variable.name)?;
        validate_name("entity type", &variable.entity_type)?;
        Ok(variable)
    }
}

pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if name.trim().is_empty() || name.trim() != name || name.chars().any(char::is_control) {
        return Err(ModelError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight() -> Variable {
        Variable::builder("weight", ValueType::Decimal, "Participant")
            .unit("kg")
            .attribute(Attribute::new("label", "Weight"))
            .attribute(Attribute::new("label", "Poids").with_locale("fr"))
            .category(Category::new("999").missing())
            .build()
            .expect("build variable")
    }

    #[test]
    fn attributes_are_keyed_by_name_and_locale() {
        let variable = weight();
        assert_eq!(variable.attribute_text("label").as_deref(), Some("Weight"));
        let french = variable.attribute("label", Some("fr")).expect("french label");
        assert_eq!(french.value.as_text(), Some("Poids"));
        let replaced = variable
            .to_builder()
            .attribute(Attribute::new("label", "Body weight"))
            .build()
            .expect("rebuild");
        assert_eq!(replaced.attributes().len(), 2);
        assert_eq!(replaced.attribute_text("label").as_deref(), Some("Body weight"));
    }

    #[test]
    fn to_builder_leaves_original_untouched() {
        let original = weight();
        let renamed = original.to_builder().name("mass").build().expect("rebuild");
        assert_eq!(original.name(), "weight");
        assert_eq!(renamed.name(), "mass");
        assert_eq!(renamed.unit(), Some("kg"));
    }

    #[test]
    fn missing_codes_come_from_categories() {
        let variable = weight();
        assert!(variable.is_missing_code(&Value::text("999")));
        assert!(!variable.is_missing_code(&Value::text("70")));
    }

    #[test]
    fn repeatable_null_is_a_sequence() {
        let variable = Variable::builder("visits", ValueType::Date, "Participant")
            .repeatable(true)
            .build()
            .expect("build variable");
        assert!(variable.null_value().is_sequence());
    }

    #[test]
    fn rejects_blank_names() {
        assert!(Variable::builder(" ", ValueType::Text, "Participant").build().is_err());
        assert!(Variable::builder("a", ValueType::Text, "").build().is_err());
    }
}
