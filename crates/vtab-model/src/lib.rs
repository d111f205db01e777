//! Value model, variables, tables and datasources.
//!
//! Everything above this crate sees data through three contracts:
//! [`Datasource`] (named set of tables with a writer), [`ValueTable`]
//! (variables plus entity-keyed value sets) and [`VariableValueSource`]
//! (computes one variable's value for a value set).

pub mod datasource;
pub mod entity;
pub mod error;
pub mod memory;
pub mod table;
pub mod value;
pub mod value_set;
pub mod value_type;
pub mod variable;

pub use datasource::{Datasource, ValueSetWriter, ValueTableWriter, VariableWriter};
pub use entity::VariableEntity;
pub use error::{ModelError, Result};
pub use memory::{MemoryDatasource, MemoryValueSource, MemoryValueTable};
pub use table::{ValueTable, VariableValueSource};
pub use value::{Datum, Value};
pub use value_set::{Occurrence, ValueSet};
pub use value_type::ValueType;
pub use variable::{Attribute, Category, SCRIPT_ATTRIBUTE, Variable, VariableBuilder};
