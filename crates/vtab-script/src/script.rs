use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;

use vtab_model::{Value, ValueSet, ValueTable};

use crate::ast::Expr;
use crate::error::{Result, ScriptError};
use crate::eval::{self, Scope};
use crate::parser;

/// A compiled, immutable script.
///
/// Compiling validates syntax, function names and arities, so a script that
/// exists can only fail at evaluation time on data-dependent errors. Clones
/// share the compiled tree.
#[derive(Clone)]
pub struct Script {
    source: Arc<str>,
    expr: Arc<Expr>,
}

impl Script {
    pub fn compile(source: &str) -> Result<Self> {
        let expr = parser::parse(source).map_err(|err| ScriptError::Syntax {
            script: source.to_string(),
            position: err.position,
            message: err.message,
        })?;
        Ok(Self {
            source: Arc::from(source),
            expr: Arc::new(expr),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variables read through `$('name')`.
    pub fn variable_names(&self) -> Vec<String> {
        self.expr.variable_names()
    }

    pub fn evaluate(&self, value_set: &ValueSet, table: &dyn ValueTable) -> Result<Value> {
        self.evaluate_at(value_set, table, Utc::now())
    }

    /// Evaluate with a fixed clock for `now()` and `today()`.
    pub fn evaluate_at(
        &self,
        value_set: &ValueSet,
        table: &dyn ValueTable,
        now: DateTime<Utc>,
    ) -> Result<Value> {
        let scope = Scope {
            value_set,
            table,
            now,
        };
        let value = eval::evaluate(&self.expr, &scope).map_err(|message| {
            ScriptError::Execution {
                script: self.source.to_string(),
                message,
            }
        })?;
        trace!(script = %self.source, value_set = %value_set, value = %value, "script evaluated");
        Ok(value)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Script").field(&self.source).finish()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
