//! Views over virtual tables.
//!
//! A [`View`] is a read-only [`ValueTable`](vtab_model::ValueTable) derived
//! from a source table through three clauses and an entity mapping:
//!
//! - [`SelectClause`] picks the visible source variables,
//! - [`WhereClause`] picks the visible value sets,
//! - [`ListClause`] adds computed variables,
//! - a [`BijectiveFunction`] renames entities in both directions.
//!
//! Views are declared as [`ViewDefinition`]s, registered per datasource by
//! the [`ViewManager`] and persisted through a [`ViewPersistenceStrategy`].
//! A [`Runtime`] ties the manager to a [`RuntimeConfig`], and
//! [`TableCopier`] materialises any table, view or not, into a datasource.

pub mod clause;
pub mod config;
pub mod copy;
pub mod datasource;
pub mod definition;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod runtime;
pub mod transform;
pub mod view;

pub use clause::{
    AllClause, FilterChainSelectClause, FilterChainWhereClause, ListClause, NoneClause,
    ScriptListClause, SelectClause, WhereClause,
};
pub use config::RuntimeConfig;
pub use copy::{CopyReport, TableCopier};
pub use datasource::{ViewAwareDatasource, ViewEntry};
pub use definition::{
    DerivedVariableDefinition, EntityMappingDefinition, IdentifierPair, SelectDefinition,
    ValueSetFilterDefinition, VariableFilterDefinition, ViewDefinition, WhereDefinition,
};
pub use error::{Result, ViewError};
pub use manager::ViewManager;
pub use persistence::{
    JsonFileViewPersistence, MemoryViewPersistence, VIEW_FILE_VERSION, ViewPersistenceStrategy,
};
pub use runtime::{Runtime, RuntimeState};
pub use transform::{
    BijectiveFunction, EntityFunction, ExplicitEntityFunction, IdentityFunction, MapFunction,
    PrefixEntityFunction, TransformedValueSource, TransformingValueTable, ValueSetFunction,
    ValueSourceFunction,
};
pub use view::{View, ViewBuilder};
