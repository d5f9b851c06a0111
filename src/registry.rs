//! Explicit registry of open stores.

use crate::error::{ConfigurationError, Result};
use crate::facade::ConfigStore;
use std::collections::BTreeMap;

/// Stores by name, owned by the caller.
#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, ConfigStore>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, store: ConfigStore) -> Result<()> {
        let name = store.name().to_string();
        if self.stores.contains_key(&name) {
            return Err(ConfigurationError::DuplicateStore(name).into());
        }
        self.stores.insert(name, store);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ConfigStore> {
        self.stores
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownStore(name.to_string()).into())
    }

    pub fn remove(&mut self, name: &str) -> Option<ConfigStore> {
        self.stores.remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigStore> {
        self.stores.values()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
