//! A datasource decorated with views.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use vtab_model::{Datasource, ModelError, ValueTable, ValueTableWriter};

use crate::definition::ViewDefinition;
use crate::error::{Result, ViewError};
use crate::view::View;

/// A registered view and the definition it was built from.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    pub definition: ViewDefinition,
    pub view: Arc<View>,
}

/// Exposes the tables of a wrapped datasource plus its views.
///
/// Views are listed after the wrapped tables, in registration order. A
/// view may not share a name with a wrapped table, and writers cannot
/// target a view.
///
/// Instances come from [`ViewManager::decorate`](crate::ViewManager::decorate),
/// and only the manager changes the registry so it stays in step with
/// persisted definitions:
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use vtab_view::{MemoryViewPersistence, ViewDefinition, ViewManager};
/// let manager = ViewManager::new(Arc::new(MemoryViewPersistence::new()));
/// let datasource = manager
///     .decorate(Arc::new(vtab_model::MemoryDatasource::new("study")))
///     .unwrap();
/// datasource.clear();
/// ```
pub struct ViewAwareDatasource {
    inner: Arc<dyn Datasource>,
    views: RwLock<Vec<ViewEntry>>,
}

impl ViewAwareDatasource {
    pub(crate) fn new(inner: Arc<dyn Datasource>) -> Self {
        Self {
            inner,
            views: RwLock::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &Arc<dyn Datasource> {
        &self.inner
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<ViewEntry>>> {
        self.views
            .read()
            .map_err(|_| ModelError::Lock("view registry lock poisoned".to_string()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<ViewEntry>>> {
        self.views
            .write()
            .map_err(|_| ModelError::Lock("view registry lock poisoned".to_string()).into())
    }

    /// Build `definition` against this datasource and register it,
    /// replacing a view of the same name. Returns the replaced entry.
    pub(crate) fn add_view(&self, definition: ViewDefinition) -> Result<Option<ViewEntry>> {
        if self.inner.has_value_table(&definition.name)? {
            return Err(ViewError::invalid_definition(
                &definition.name,
                format!(
                    "datasource '{}' already has a table of that name",
                    self.inner.name()
                ),
            ));
        }
        let view = Arc::new(definition.build(self)?);
        let entry = ViewEntry { definition, view };
        let mut views = self.write()?;
        let replaced = match views
            .iter()
            .position(|existing| existing.definition.name == entry.definition.name)
        {
            Some(index) => Some(std::mem::replace(&mut views[index], entry)),
            None => {
                views.push(entry);
                None
            }
        };
        debug!(datasource = %self.inner.name(), replaced = replaced.is_some(), "registered view");
        Ok(replaced)
    }

    /// Unregister a view. Returns the removed entry, if any.
    pub(crate) fn remove_view(&self, name: &str) -> Result<Option<ViewEntry>> {
        let mut views = self.write()?;
        Ok(views
            .iter()
            .position(|entry| entry.definition.name == name)
            .map(|index| views.remove(index)))
    }

    /// Current registrations, for a later [`replace_all`](Self::replace_all).
    pub(crate) fn entries(&self) -> Result<Vec<ViewEntry>> {
        Ok(self.read()?.clone())
    }

    pub fn view(&self, name: &str) -> Result<Arc<View>> {
        self.read()?
            .iter()
            .find(|entry| entry.definition.name == name)
            .map(|entry| Arc::clone(&entry.view))
            .ok_or_else(|| ViewError::no_such_view(self.inner.name(), name))
    }

    pub fn has_view(&self, name: &str) -> Result<bool> {
        Ok(self
            .read()?
            .iter()
            .any(|entry| entry.definition.name == name))
    }

    pub fn views(&self) -> Result<Vec<Arc<View>>> {
        Ok(self
            .read()?
            .iter()
            .map(|entry| Arc::clone(&entry.view))
            .collect())
    }

    pub fn definitions(&self) -> Result<Vec<ViewDefinition>> {
        Ok(self
            .read()?
            .iter()
            .map(|entry| entry.definition.clone())
            .collect())
    }

    /// Drop every view. Returns what was registered.
    pub(crate) fn clear(&self) -> Result<Vec<ViewEntry>> {
        let removed = std::mem::take(&mut *self.write()?);
        if !removed.is_empty() {
            info!(datasource = %self.inner.name(), count = removed.len(), "cleared views");
        }
        Ok(removed)
    }

    /// Replace the whole registry with a snapshot taken by
    /// [`entries`](Self::entries).
    pub(crate) fn replace_all(&self, entries: Vec<ViewEntry>) -> Result<()> {
        *self.write()? = entries;
        Ok(())
    }
}

impl Datasource for ViewAwareDatasource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn type_tag(&self) -> &str {
        self.inner.type_tag()
    }

    fn table_names(&self) -> vtab_model::Result<Vec<String>> {
        let mut names = self.inner.table_names()?;
        names.extend(
            self.read()?
                .iter()
                .map(|entry| entry.definition.name.clone()),
        );
        Ok(names)
    }

    fn value_table(&self, name: &str) -> vtab_model::Result<Arc<dyn ValueTable>> {
        if let Some(entry) = self
            .read()?
            .iter()
            .find(|entry| entry.definition.name == name)
        {
            let view: Arc<dyn ValueTable> = Arc::clone(&entry.view) as Arc<dyn ValueTable>;
            return Ok(view);
        }
        self.inner.value_table(name)
    }

    fn has_value_table(&self, name: &str) -> vtab_model::Result<bool> {
        Ok(self.has_view(name)? || self.inner.has_value_table(name)?)
    }

    fn create_writer(&self, table: &str, entity_type: &str) -> vtab_model::Result<Box<dyn ValueTableWriter>> {
        if self.has_view(table)? {
            return Err(ModelError::unsupported(format!("view '{table}' is read-only")));
        }
        self.inner.create_writer(table, entity_type)
    }
}

impl std::fmt::Debug for ViewAwareDatasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewAwareDatasource")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}
