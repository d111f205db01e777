//! Explicit runtime context.
//!
//! A [`Runtime`] owns the datasource registry and the view manager of one
//! engine instance. Components receive it (or the pieces they need) as an
//! argument; there is no process-wide instance, so tests can run several
//! runtimes side by side.
//!
//! # Example
//!
//! ```ignore
//! let runtime = Runtime::from_config(RuntimeConfig::default());
//! runtime.init()?;
//! let study = runtime.add_datasource(Arc::new(MemoryDatasource::new("study")))?;
//! runtime.view_manager()?.add_view("study", definition)?;
//! runtime.shutdown()?;
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::info;

use vtab_model::{Datasource, ModelError};

use crate::config::RuntimeConfig;
use crate::datasource::ViewAwareDatasource;
use crate::error::{Result, ViewError};
use crate::manager::ViewManager;
use crate::persistence::{JsonFileViewPersistence, MemoryViewPersistence, ViewPersistenceStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Created,
    Running,
    Stopped,
}

impl RuntimeState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct Runtime {
    config: RuntimeConfig,
    views: Arc<ViewManager>,
    state: Mutex<RuntimeState>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, persistence: Arc<dyn ViewPersistenceStrategy>) -> Self {
        Self {
            config,
            views: Arc::new(ViewManager::new(persistence)),
            state: Mutex::new(RuntimeState::Created),
        }
    }

    /// Persist views under `views_dir` when configured, in memory
    /// otherwise.
    pub fn from_config(config: RuntimeConfig) -> Self {
        let persistence: Arc<dyn ViewPersistenceStrategy> = match &config.views_dir {
            Some(dir) => Arc::new(JsonFileViewPersistence::new(dir.clone())),
            None => Arc::new(MemoryViewPersistence::new()),
        };
        Self::new(config, persistence)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> Result<RuntimeState> {
        Ok(*self
            .state
            .lock()
            .map_err(|_| ModelError::Lock("runtime state lock poisoned".to_string()))?)
    }

    fn transition(&self, from: RuntimeState, to: RuntimeState) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ModelError::Lock("runtime state lock poisoned".to_string()))?;
        if *state != from {
            return Err(ViewError::IllegalState {
                expected: from.name(),
                actual: state.name(),
            });
        }
        *state = to;
        Ok(())
    }

    fn require_running(&self) -> Result<()> {
        let state = self.state()?;
        if state == RuntimeState::Running {
            Ok(())
        } else {
            Err(ViewError::IllegalState {
                expected: RuntimeState::Running.name(),
                actual: state.name(),
            })
        }
    }

    pub fn init(&self) -> Result<()> {
        self.transition(RuntimeState::Created, RuntimeState::Running)?;
        info!(views_dir = ?self.config.views_dir, "runtime started");
        Ok(())
    }

    /// Register a datasource and restore its views.
    pub fn add_datasource(&self, datasource: Arc<dyn Datasource>) -> Result<Arc<ViewAwareDatasource>> {
        self.require_running()?;
        self.views.decorate(datasource)
    }

    pub fn datasource(&self, name: &str) -> Result<Arc<ViewAwareDatasource>> {
        self.require_running()?;
        self.views.datasource(name)
    }

    pub fn remove_datasource(&self, name: &str) -> Result<()> {
        self.require_running()?;
        self.views
            .release(name)?
            .map(|_| ())
            .ok_or_else(|| ViewError::NoSuchDatasource {
                name: name.to_string(),
            })
    }

    pub fn view_manager(&self) -> Result<Arc<ViewManager>> {
        self.require_running()?;
        Ok(Arc::clone(&self.views))
    }

    /// Release every datasource. The runtime cannot be restarted.
    pub fn shutdown(&self) -> Result<()> {
        self.transition(RuntimeState::Running, RuntimeState::Stopped)?;
        let names = self.views.datasource_names()?;
        for name in &names {
            self.views.release(name)?;
        }
        info!(released = names.len(), "runtime stopped");
        Ok(())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtab_model::MemoryDatasource;

    #[test]
    fn lifecycle_is_enforced() {
        let runtime = Runtime::from_config(RuntimeConfig::default());
        let err = runtime
            .add_datasource(Arc::new(MemoryDatasource::new("study")))
            .unwrap_err();
        assert!(matches!(err, ViewError::IllegalState { actual: "created", .. }));
        runtime.init().expect("init");
        assert!(runtime.init().is_err());
        runtime
            .add_datasource(Arc::new(MemoryDatasource::new("study")))
            .expect("add");
        assert_eq!(runtime.datasource("study").expect("lookup").name(), "study");
        runtime.shutdown().expect("shutdown");
        assert_eq!(runtime.state().expect("state"), RuntimeState::Stopped);
        let err = runtime.view_manager().unwrap_err();
        assert!(matches!(err, ViewError::IllegalState { actual: "stopped", .. }));
    }

    #[test]
    fn runtimes_are_isolated() {
        let first = Runtime::from_config(RuntimeConfig::default());
        let second = Runtime::from_config(RuntimeConfig::default());
        first.init().expect("init");
        second.init().expect("init");
        first
            .add_datasource(Arc::new(MemoryDatasource::new("study")))
            .expect("add");
        assert!(second.datasource("study").is_err());
        first.remove_datasource("study").expect("remove");
        assert!(matches!(
            first.remove_datasource("study").unwrap_err(),
            ViewError::NoSuchDatasource { .. }
        ));
    }
}
