//! Script-computed variable values.

use tracing::warn;

use vtab_model::{
    ModelError, SCRIPT_ATTRIBUTE, Value, ValueSet, ValueTable, Variable, VariableValueSource,
};

use crate::error::{Result, ScriptError};
use crate::script::Script;

/// Computes a variable's value by evaluating a script against the row.
///
/// Results of another type are converted through text; a result that cannot
/// be converted yields the variable's null value. Script failures propagate
/// as [`ModelError::ScriptExecution`].
#[derive(Debug, Clone)]
pub struct ScriptVariableValueSource {
    variable: Variable,
    script: Script,
}

impl ScriptVariableValueSource {
    pub fn new(variable: Variable, script: Script) -> Self {
        Self { variable, script }
    }

    /// Compile the expression held in the variable's `script` attribute.
    pub fn from_variable(variable: Variable) -> Result<Self> {
        let Some(expression) = variable.attribute_text(SCRIPT_ATTRIBUTE) else {
            return Err(ScriptError::MissingScript {
                variable: variable.name().to_string(),
            });
        };
        let script = Script::compile(&expression)?;
        Ok(Self::new(variable, script))
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    fn coerce(&self, value: Value) -> Value {
        let target = self.variable.value_type();
        if self.variable.is_repeatable() {
            if value.is_null() {
                return self.variable.null_value();
            }
            if !value.is_sequence() {
                let element = self.convert(value);
                return target
                    .sequence_of([element])
                    .unwrap_or_else(|_| self.variable.null_value());
            }
            return self.convert(value);
        }
        if value.is_sequence() {
            warn!(
                variable = %self.variable.name(),
                script = %self.script,
                "script returned a sequence for a non-repeatable variable"
            );
            return self.variable.null_value();
        }
        self.convert(value)
    }

    fn convert(&self, value: Value) -> Value {
        let target = self.variable.value_type();
        if value.value_type() == target {
            return value;
        }
        match value.convert(target) {
            Ok(converted) => converted,
            Err(err) => {
                warn!(
                    variable = %self.variable.name(),
                    script = %self.script,
                    error = %err,
                    "script result does not convert, using null"
                );
                if value.is_sequence() {
                    target.null_sequence()
                } else {
                    target.null_value()
                }
            }
        }
    }
}

impl VariableValueSource for ScriptVariableValueSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    fn value(&self, value_set: &ValueSet, table: &dyn ValueTable) -> vtab_model::Result<Value> {
        let value = self
            .script
            .evaluate(value_set, table)
            .map_err(ModelError::from)?;
        Ok(self.coerce(value))
    }
}
