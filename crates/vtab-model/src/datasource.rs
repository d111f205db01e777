//! Datasources and the writer contract.
//!
//! Writers are scoped resources: state becomes visible on `close`, and a
//! writer dropped without closing discards what it buffered.

use std::sync::Arc;

use crate::entity::VariableEntity;
use crate::error::Result;
use crate::table::ValueTable;
use crate::value::Value;
use crate::variable::Variable;

/// A named root container of value tables backed by one store.
pub trait Datasource: Send + Sync {
    fn name(&self) -> &str;

    /// Backend kind, e.g. `memory`.
    fn type_tag(&self) -> &str;

    fn table_names(&self) -> Result<Vec<String>>;

    fn value_tables(&self) -> Result<Vec<Arc<dyn ValueTable>>> {
        self.table_names()?
            .iter()
            .map(|name| self.value_table(name))
            .collect()
    }

    fn value_table(&self, name: &str) -> Result<Arc<dyn ValueTable>>;

    fn has_value_table(&self, name: &str) -> Result<bool> {
        Ok(self.table_names()?.iter().any(|table| table == name))
    }

    /// Open a writer on `table`, creating the table when absent.
    fn create_writer(&self, table: &str, entity_type: &str) -> Result<Box<dyn ValueTableWriter>>;
}

/// Appends variables and value sets to one table.
pub trait ValueTableWriter: Send + Sync {
    fn table_name(&self) -> &str;

    fn write_variables(&self) -> Result<Box<dyn VariableWriter>>;

    fn write_value_set(&self, entity: &VariableEntity) -> Result<Box<dyn ValueSetWriter>>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait VariableWriter: Send {
    fn write_variable(&mut self, variable: &Variable) -> Result<()>;

    fn remove_variable(&mut self, name: &str) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait ValueSetWriter: Send {
    fn write_value(&mut self, variable: &Variable, value: Value) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}
