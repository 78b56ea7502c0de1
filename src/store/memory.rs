//! In-process store backed by `DashMap`, with a read-through cache.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::unit::{ProxyConfig, Target};
use crate::error::StoreError;
use crate::store::Store;

/// Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    configs: Arc<DashMap<String, ProxyConfig>>,
    cache: Arc<DashMap<String, ProxyConfig>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `units`; later duplicates of an id win.
    pub fn seeded(units: impl IntoIterator<Item = ProxyConfig>) -> Self {
        let store = Self::new();
        for unit in units {
            store.configs.insert(unit.id.clone(), unit);
        }
        store
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored configurations.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn load(&self, id: &str) -> Result<ProxyConfig, StoreError> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(cached.value().clone());
        }
        let config = self
            .configs
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.cache.insert(id.to_string(), config.clone());
        Ok(config)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_all_configs(&self) -> Result<Vec<ProxyConfig>, StoreError> {
        self.check()?;
        let mut configs: Vec<ProxyConfig> = self.configs.iter().map(|r| r.value().clone()).collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(configs)
    }

    async fn get_config(&self, id: &str) -> Result<ProxyConfig, StoreError> {
        self.check()?;
        self.load(id)
    }

    async fn save_config(&self, config: &ProxyConfig) -> Result<(), StoreError> {
        self.check()?;
        self.configs.insert(config.id.clone(), config.clone());
        self.cache.remove(&config.id);
        Ok(())
    }

    async fn delete_config(&self, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.configs.remove(id);
        self.cache.remove(id);
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> Result<(), StoreError> {
        self.check()?;
        self.cache.remove(id);
        Ok(())
    }

    async fn get_targets(&self, id: &str) -> Result<Vec<Target>, StoreError> {
        self.check()?;
        self.load(id).map(|config| config.targets)
    }
}
