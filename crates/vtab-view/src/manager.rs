//! The view manager.
//!
//! Owns one [`ViewAwareDatasource`] per datasource name and keeps the
//! registered views and the persisted definitions in agreement: every
//! mutation changes the in-memory registry, then writes the full list of
//! definitions, and puts the registry back if the write fails.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, info_span, warn};

use vtab_model::{Datasource, ModelError};

use crate::datasource::{ViewAwareDatasource, ViewEntry};
use crate::definition::ViewDefinition;
use crate::error::{Result, ViewError};
use crate::persistence::ViewPersistenceStrategy;
use crate::view::View;

type Registry = BTreeMap<String, Arc<ViewAwareDatasource>>;

pub struct ViewManager {
    persistence: Arc<dyn ViewPersistenceStrategy>,
    datasources: Mutex<Registry>,
}

impl ViewManager {
    pub fn new(persistence: Arc<dyn ViewPersistenceStrategy>) -> Self {
        Self {
            persistence,
            datasources: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>> {
        self.datasources
            .lock()
            .map_err(|_| ModelError::Lock("view manager lock poisoned".to_string()).into())
    }

    fn lookup(registry: &Registry, datasource: &str) -> Result<Arc<ViewAwareDatasource>> {
        registry
            .get(datasource)
            .cloned()
            .ok_or_else(|| ViewError::NoSuchDatasource {
                name: datasource.to_string(),
            })
    }

    /// Wrap `datasource` and restore its persisted views.
    ///
    /// Decorating a name twice returns the existing wrapper. A persisted
    /// view that no longer builds fails the decoration.
    pub fn decorate(&self, datasource: Arc<dyn Datasource>) -> Result<Arc<ViewAwareDatasource>> {
        let mut registry = self.lock()?;
        let name = datasource.name().to_string();
        if let Some(existing) = registry.get(&name) {
            return Ok(Arc::clone(existing));
        }
        let wrapper = Arc::new(ViewAwareDatasource::new(datasource));
        let definitions = self.persistence.read_views(&name)?;
        let restored = definitions.len();
        for definition in definitions {
            wrapper.add_view(definition)?;
        }
        registry.insert(name.clone(), Arc::clone(&wrapper));
        info!(datasource = %name, restored, "decorated datasource");
        Ok(wrapper)
    }

    /// Forget a datasource. Its persisted views are kept.
    pub fn release(&self, datasource: &str) -> Result<Option<Arc<ViewAwareDatasource>>> {
        Ok(self.lock()?.remove(datasource))
    }

    pub fn datasource(&self, datasource: &str) -> Result<Arc<ViewAwareDatasource>> {
        Self::lookup(&*self.lock()?, datasource)
    }

    pub fn datasource_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    /// Register or replace a view and persist the datasource's views.
    pub fn add_view(&self, datasource: &str, definition: ViewDefinition) -> Result<Arc<View>> {
        let span = info_span!("add_view", datasource, view = %definition.name);
        let _guard = span.enter();
        let registry = self.lock()?;
        let wrapper = Self::lookup(&registry, datasource)?;
        let name = definition.name.clone();
        let snapshot = wrapper.entries()?;
        let replaced = wrapper.add_view(definition)?;
        self.persist_or_rollback(&wrapper, snapshot)?;
        info!(replaced = replaced.is_some(), "added view");
        wrapper.view(&name)
    }

    /// Unregister a view and persist the datasource's views.
    ///
    /// A view that other views read from cannot be removed.
    pub fn remove_view(&self, datasource: &str, view: &str) -> Result<()> {
        let span = info_span!("remove_view", datasource, view);
        let _guard = span.enter();
        let registry = self.lock()?;
        let wrapper = Self::lookup(&registry, datasource)?;
        let snapshot = wrapper.entries()?;
        if let Some(dependent) = snapshot
            .iter()
            .find(|entry| entry.definition.source == view)
        {
            return Err(ViewError::invalid_definition(
                view,
                format!("view '{}' reads from it", dependent.definition.name),
            ));
        }
        if wrapper.remove_view(view)?.is_none() {
            return Err(ViewError::no_such_view(datasource, view));
        }
        self.persist_or_rollback(&wrapper, snapshot)?;
        info!("removed view");
        Ok(())
    }

    /// Unregister every view of a datasource and persist the empty list.
    pub fn remove_all_views(&self, datasource: &str) -> Result<usize> {
        let span = info_span!("remove_all_views", datasource);
        let _guard = span.enter();
        let registry = self.lock()?;
        let wrapper = Self::lookup(&registry, datasource)?;
        let removed = wrapper.clear()?;
        let count = removed.len();
        self.persist_or_rollback(&wrapper, removed)?;
        info!(count, "removed all views");
        Ok(count)
    }

    pub fn get_view(&self, datasource: &str, view: &str) -> Result<Arc<View>> {
        self.datasource(datasource)?.view(view)
    }

    /// Fails with [`ViewError::NoSuchDatasource`] for an undecorated
    /// datasource.
    pub fn has_view(&self, datasource: &str, view: &str) -> Result<bool> {
        self.datasource(datasource)?.has_view(view)
    }

    pub fn views(&self, datasource: &str) -> Result<Vec<Arc<View>>> {
        self.datasource(datasource)?.views()
    }

    fn persist_or_rollback(
        &self,
        wrapper: &ViewAwareDatasource,
        snapshot: Vec<ViewEntry>,
    ) -> Result<()> {
        let definitions = wrapper.definitions()?;
        let Err(err) = self.persistence.write_views(wrapper.name(), &definitions) else {
            return Ok(());
        };
        warn!(error = %err, "persisting views failed, rolling back");
        if let Err(rollback) = wrapper.replace_all(snapshot) {
            warn!(error = %rollback, "rollback failed");
        }
        Err(err)
    }
}

impl std::fmt::Debug for ViewManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryViewPersistence;
    use vtab_model::{MemoryDatasource, ValueType, Variable};

    fn manager_with_people() -> (ViewManager, Arc<MemoryDatasource>) {
        let datasource = Arc::new(MemoryDatasource::new("study"));
        let table = datasource.create_table("people", "Participant").expect("table");
        table
            .add_variable(
                Variable::builder("age", ValueType::Integer, "Participant")
                    .build()
                    .expect("variable"),
            )
            .expect("add");
        let manager = ViewManager::new(Arc::new(MemoryViewPersistence::new()));
        (manager, datasource)
    }

    #[test]
    fn decorate_is_deduplicated() {
        let (manager, datasource) = manager_with_people();
        let first = manager.decorate(datasource.clone()).expect("decorate");
        let second = manager.decorate(datasource).expect("decorate");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.datasource_names().expect("names"), ["study"]);
    }

    #[test]
    fn lookups_distinguish_datasource_from_view() {
        let (manager, datasource) = manager_with_people();
        let err = manager.has_view("nowhere", "v").unwrap_err();
        assert!(matches!(err, ViewError::NoSuchDatasource { ref name } if name == "nowhere"));
        manager.decorate(datasource).expect("decorate");
        assert!(!manager.has_view("study", "v").expect("has view"));
        let err = manager.get_view("study", "v").unwrap_err();
        assert!(matches!(err, ViewError::NoSuchView { ref view, .. } if view == "v"));
    }

    #[test]
    fn dependent_views_pin_their_source() {
        let (manager, datasource) = manager_with_people();
        manager.decorate(datasource).expect("decorate");
        manager
            .add_view("study", ViewDefinition::new("base", "people"))
            .expect("base");
        manager
            .add_view("study", ViewDefinition::new("derived", "base"))
            .expect("derived");
        let err = manager.remove_view("study", "base").unwrap_err();
        assert!(matches!(err, ViewError::InvalidDefinition { .. }));
        manager.remove_view("study", "derived").expect("remove derived");
        manager.remove_view("study", "base").expect("remove base");
        let err = manager.remove_view("study", "base").unwrap_err();
        assert!(matches!(err, ViewError::NoSuchView { .. }));
    }

    #[test]
    fn view_names_cannot_shadow_tables() {
        let (manager, datasource) = manager_with_people();
        manager.decorate(datasource).expect("decorate");
        let err = manager
            .add_view("study", ViewDefinition::new("people", "people"))
            .unwrap_err();
        assert!(matches!(err, ViewError::InvalidDefinition { .. }));
    }
}
