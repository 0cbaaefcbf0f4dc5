//! Name-keyed catalogue of storage backends.

use super::{DirectoryStore, MemoryStore, RecordStore};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Builds a store over a resolved data directory.
pub type StoreFactory = Box<dyn Fn(&Path, &StorageConfig) -> Result<Arc<dyn RecordStore>> + Send + Sync>;

/// Explicit registry of backend factories.
///
/// Callers build one and pass it around; there is no process-wide instance.
#[derive(Default)]
pub struct StoreRegistry {
    factories: BTreeMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `directory` and `memory` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("directory", |dir, config| {
            let store = if config.exclusive {
                DirectoryStore::open_exclusive(dir)?
            } else {
                DirectoryStore::open(dir)?
            };
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        });
        registry.register("memory", |_, _| Ok(Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>));
        registry
    }

    /// Adds or replaces the factory registered under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Path, &StorageConfig) -> Result<Arc<dyn RecordStore>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Creates the backend selected by `config.backend`.
    pub fn create(&self, config: &StorageConfig) -> Result<Arc<dyn RecordStore>> {
        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| StorageError::UnknownBackend(config.backend.clone()))?;
        let dir = config.resolve_data_dir()?;
        factory(&dir, config)
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("backends", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
