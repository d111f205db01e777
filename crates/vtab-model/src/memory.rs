//! Thread-safe in-memory datasource.
//!
//! Used as the reference backend in tests and as the copy target of the CLI.
//!
//! # Example
//!
//! ```ignore
//! let datasource = MemoryDatasource::new("study");
//! let table = datasource.create_table("visits", "Participant")?;
//! table.add_variable(Variable::builder("age", ValueType::Integer, "Participant").build()?)?;
//! table.put_value(&VariableEntity::new("Participant", "1"), "age", Value::integer(42))?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::datasource::{Datasource, ValueSetWriter, ValueTableWriter, VariableWriter};
use crate::entity::VariableEntity;
use crate::error::{ModelError, Result};
use crate::table::{ValueTable, VariableValueSource};
use crate::value::Value;
use crate::value_set::ValueSet;
use crate::variable::{Variable, validate_name};

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| ModelError::Lock(format!("{what} lock poisoned")))
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| ModelError::Lock(format!("{what} lock poisoned")))
}

/// A datasource holding its tables in memory.
#[derive(Debug)]
pub struct MemoryDatasource {
    name: String,
    tables: RwLock<BTreeMap<String, Arc<MemoryValueTable>>>,
}

impl MemoryDatasource {
    pub const TYPE: &'static str = "memory";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    /// Return the named table, creating it when absent.
    ///
    /// An existing table with another entity type is an
    /// [`ModelError::EntityTypeMismatch`].
    pub fn create_table(&self, name: &str, entity_type: &str) -> Result<Arc<MemoryValueTable>> {
        validate_name("table", name)?;
        validate_name("entity type", entity_type)?;
        let mut tables = write_lock(&self.tables, "datasource")?;
        if let Some(existing) = tables.get(name) {
            if existing.entity_type != entity_type {
                return Err(ModelError::EntityTypeMismatch {
                    table: name.to_string(),
                    expected: existing.entity_type.clone(),
                    actual: entity_type.to_string(),
                });
            }
            return Ok(Arc::clone(existing));
        }
        let table = Arc::new(MemoryValueTable::new(&self.name, name, entity_type));
        tables.insert(name.to_string(), Arc::clone(&table));
        debug!(datasource = %self.name, table = name, entity_type, "created memory table");
        Ok(table)
    }

    pub fn table(&self, name: &str) -> Result<Arc<MemoryValueTable>> {
        read_lock(&self.tables, "datasource")?
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::no_such_table(&self.name, name))
    }

    /// Remove a table. Returns whether it existed.
    pub fn drop_table(&self, name: &str) -> Result<bool> {
        Ok(write_lock(&self.tables, "datasource")?.remove(name).is_some())
    }
}

impl Datasource for MemoryDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_tag(&self) -> &str {
        Self::TYPE
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(read_lock(&self.tables, "datasource")?.keys().cloned().collect())
    }

    fn value_table(&self, name: &str) -> Result<Arc<dyn ValueTable>> {
        let table: Arc<dyn ValueTable> = self.table(name)?;
        Ok(table)
    }

    fn has_value_table(&self, name: &str) -> Result<bool> {
        Ok(read_lock(&self.tables, "datasource")?.contains_key(name))
    }

    fn create_writer(&self, table: &str, entity_type: &str) -> Result<Box<dyn ValueTableWriter>> {
        let table = self.create_table(table, entity_type)?;
        Ok(Box::new(MemoryValueTableWriter { table }))
    }
}

#[derive(Debug, Default)]
struct TableStore {
    variables: Vec<Variable>,
    rows: BTreeMap<VariableEntity, BTreeMap<String, Value>>,
}

impl TableStore {
    fn variable(&self, table: &str, name: &str) -> Result<&Variable> {
        self.variables
            .iter()
            .find(|variable| variable.name() == name)
            .ok_or_else(|| ModelError::no_such_variable(table, name))
    }

    fn upsert_variable(&mut self, variable: Variable) {
        match self
            .variables
            .iter()
            .position(|existing| existing.name() == variable.name())
        {
            Some(index) => self.variables[index] = variable,
            None => self.variables.push(variable),
        }
    }

    fn remove_variable(&mut self, name: &str) -> bool {
        let before = self.variables.len();
        self.variables.retain(|variable| variable.name() != name);
        for row in self.rows.values_mut() {
            row.remove(name);
        }
        self.variables.len() != before
    }
}

/// An in-memory table. Rows are keyed by entity, cells by variable name.
#[derive(Debug)]
pub struct MemoryValueTable {
    datasource: String,
    name: String,
    entity_type: String,
    store: Arc<RwLock<TableStore>>,
}

impl MemoryValueTable {
    fn new(datasource: &str, name: &str, entity_type: &str) -> Self {
        Self {
            datasource: datasource.to_string(),
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            store: Arc::new(RwLock::new(TableStore::default())),
        }
    }

    /// Add a variable, replacing any variable with the same name.
    pub fn add_variable(&self, variable: Variable) -> Result<()> {
        self.check_entity_type(variable.entity_type())?;
        write_lock(&self.store, "table")?.upsert_variable(variable);
        Ok(())
    }

    /// Remove a variable and its cells. Returns whether it existed.
    pub fn remove_variable(&self, name: &str) -> Result<bool> {
        Ok(write_lock(&self.store, "table")?.remove_variable(name))
    }

    /// Validate a batch of variable changes, then apply them under a single
    /// lock. Nothing changes when any entry is rejected.
    fn apply_variable_changes(&self, changes: Vec<VariableChange>) -> Result<()> {
        for change in &changes {
            match change {
                VariableChange::Write(variable) => {
                    self.check_entity_type(variable.entity_type())?;
                }
                VariableChange::Remove(name) => validate_name("variable", name)?,
            }
        }
        let mut store = write_lock(&self.store, "table")?;
        for change in changes {
            match change {
                VariableChange::Write(variable) => store.upsert_variable(variable),
                VariableChange::Remove(name) => {
                    store.remove_variable(&name);
                }
            }
        }
        Ok(())
    }

    /// Register an entity with an empty row.
    pub fn add_entity(&self, entity: VariableEntity) -> Result<()> {
        self.check_entity_type(entity.entity_type())?;
        write_lock(&self.store, "table")?.rows.entry(entity).or_default();
        Ok(())
    }

    pub fn put_value(&self, entity: &VariableEntity, variable: &str, value: Value) -> Result<()> {
        self.commit_value_set(entity, vec![(variable.to_string(), value)])
    }

    /// Validate and store a batch of cells for one entity under a single
    /// lock. Nothing is written when any cell is rejected.
    pub fn commit_value_set(
        &self,
        entity: &VariableEntity,
        values: Vec<(String, Value)>,
    ) -> Result<()> {
        self.check_entity_type(entity.entity_type())?;
        let mut store = write_lock(&self.store, "table")?;
        let mut checked = Vec::with_capacity(values.len());
        for (name, value) in values {
            let variable = store.variable(&self.name, &name)?;
            checked.push((name, conform(variable, value)?));
        }
        let row = store.rows.entry(entity.clone()).or_default();
        for (name, value) in checked {
            row.insert(name, value);
        }
        Ok(())
    }

    pub fn entity_count(&self) -> Result<usize> {
        Ok(read_lock(&self.store, "table")?.rows.len())
    }

    fn check_entity_type(&self, entity_type: &str) -> Result<()> {
        if entity_type == self.entity_type {
            Ok(())
        } else {
            Err(ModelError::EntityTypeMismatch {
                table: self.name.clone(),
                expected: self.entity_type.clone(),
                actual: entity_type.to_string(),
            })
        }
    }
}

/// Check a value against its variable; scalars written to a repeatable
/// variable become one-element sequences.
fn conform(variable: &Variable, value: Value) -> Result<Value> {
    if value.value_type() != variable.value_type() {
        return Err(ModelError::ValueTypeMismatch {
            variable: variable.name().to_string(),
            expected: variable.value_type(),
            actual: value.value_type(),
        });
    }
    match (variable.is_repeatable(), value.is_sequence()) {
        (true, true) | (false, false) => Ok(value),
        (true, false) if value.is_null() => Ok(variable.null_value()),
        (true, false) => variable.value_type().sequence_of([value]),
        (false, true) => Err(ModelError::InvalidValue {
            variable: variable.name().to_string(),
            message: "sequence written to a non-repeatable variable".to_string(),
        }),
    }
}

impl ValueTable for MemoryValueTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn datasource_name(&self) -> &str {
        &self.datasource
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        Ok(read_lock(&self.store, "table")?.variables.clone())
    }

    fn variable(&self, name: &str) -> Result<Variable> {
        read_lock(&self.store, "table")?
            .variable(&self.name, name)
            .cloned()
    }

    fn variable_entities(&self) -> Result<BTreeSet<VariableEntity>> {
        Ok(read_lock(&self.store, "table")?.rows.keys().cloned().collect())
    }

    fn has_value_set(&self, entity: &VariableEntity) -> Result<bool> {
        Ok(read_lock(&self.store, "table")?.rows.contains_key(entity))
    }

    fn variable_value_source(&self, name: &str) -> Result<Arc<dyn VariableValueSource>> {
        let variable = self.variable(name)?;
        Ok(Arc::new(MemoryValueSource {
            table: self.name.clone(),
            variable,
            store: Arc::clone(&self.store),
        }))
    }
}

/// Reads one column of a [`MemoryValueTable`].
#[derive(Debug)]
pub struct MemoryValueSource {
    table: String,
    variable: Variable,
    store: Arc<RwLock<TableStore>>,
}

impl VariableValueSource for MemoryValueSource {
    fn variable(&self) -> &Variable {
        &self.variable
    }

    fn value(&self, value_set: &ValueSet, _table: &dyn ValueTable) -> Result<Value> {
        let store = read_lock(&self.store, "table")?;
        let row = store
            .rows
            .get(value_set.entity())
            .ok_or_else(|| ModelError::no_such_value_set(&self.table, value_set.entity()))?;
        Ok(row
            .get(self.variable.name())
            .cloned()
            .unwrap_or_else(|| self.variable.null_value()))
    }
}

struct MemoryValueTableWriter {
    table: Arc<MemoryValueTable>,
}

impl ValueTableWriter for MemoryValueTableWriter {
    fn table_name(&self) -> &str {
        &self.table.name
    }

    fn write_variables(&self) -> Result<Box<dyn VariableWriter>> {
        Ok(Box::new(MemoryVariableWriter {
            table: Arc::clone(&self.table),
            pending: Vec::new(),
        }))
    }

    fn write_value_set(&self, entity: &VariableEntity) -> Result<Box<dyn ValueSetWriter>> {
        self.table.check_entity_type(entity.entity_type())?;
        Ok(Box::new(MemoryValueSetWriter {
            table: Arc::clone(&self.table),
            entity: entity.clone(),
            pending: Vec::new(),
        }))
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

enum VariableChange {
    Write(Variable),
    Remove(String),
}

struct MemoryVariableWriter {
    table: Arc<MemoryValueTable>,
    pending: Vec<VariableChange>,
}

impl VariableWriter for MemoryVariableWriter {
    fn write_variable(&mut self, variable: &Variable) -> Result<()> {
        self.table.check_entity_type(variable.entity_type())?;
        self.pending.push(VariableChange::Write(variable.clone()));
        Ok(())
    }

    fn remove_variable(&mut self, name: &str) -> Result<()> {
        self.pending.push(VariableChange::Remove(name.to_string()));
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.table.apply_variable_changes(self.pending)
    }
}

struct MemoryValueSetWriter {
    table: Arc<MemoryValueTable>,
    entity: VariableEntity,
    pending: Vec<(String, Value)>,
}

impl ValueSetWriter for MemoryValueSetWriter {
    fn write_value(&mut self, variable: &Variable, value: Value) -> Result<()> {
        self.pending.push((variable.name().to_string(), value));
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.table.commit_value_set(&self.entity, self.pending)
    }
}
