//! Filter engine.
//!
//! [`FilterChain`] runs items through ordered [`Filter`]s, tracking each
//! item's [`FilterState`] in a [`StateEnvelope`].

pub mod chain;
pub mod error;
pub mod filters;
pub mod state;

use vtab_model::{ValueSet, ValueTable, Variable};

pub use chain::{Filter, FilterChain};
pub use error::{FilterError, Result};
pub use filters::{
    EntityIdFilter, ExcludeAllFilter, FilterAction, IncludeAllFilter, ValueTypeFilter,
    VariableAttributeFilter, VariableNameFilter, VariableValueFilter, apply_action,
};
pub use state::{FilterState, StateEnvelope};

pub type VariableFilterChain = FilterChain<Variable>;

/// Value-set chains evaluate against the table the value sets belong to.
pub type ValueSetFilterChain = FilterChain<ValueSet, dyn ValueTable>;
