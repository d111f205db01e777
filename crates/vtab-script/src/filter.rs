use vtab_filter::{Filter, FilterAction, FilterError, StateEnvelope, apply_action};
use vtab_model::{ModelError, ValueSet, ValueTable, ValueType};

use crate::script::Script;

/// Matches value sets for which a boolean script yields `true`.
///
/// `false` and null do not match. A script yielding any other type fails
/// the chain.
#[derive(Debug, Clone)]
pub struct ScriptFilter {
    script: Script,
    action: FilterAction,
}

impl ScriptFilter {
    pub fn new(script: Script, action: FilterAction) -> Self {
        Self { script, action }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }
}

impl Filter<ValueSet, dyn ValueTable> for ScriptFilter {
    fn apply(
        &self,
        envelope: &mut StateEnvelope<ValueSet>,
        table: &(dyn ValueTable + 'static),
    ) -> vtab_filter::Result<()> {
        if envelope.state().is_terminal() {
            return Ok(());
        }
        let value = self.script.evaluate(envelope.item(), table)?;
        if value.value_type() != ValueType::Boolean {
            return Err(FilterError::Model(ModelError::ScriptExecution {
                script: self.script.source().to_string(),
                message: format!("expected a boolean result, got {}", value.value_type()),
            }));
        }
        if value.as_boolean() == Some(true) {
            apply_action(envelope, self.action)?;
        }
        Ok(())
    }
}
