//! Registry of live routing units.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Store.get_all_configs + get_targets → apply_create each
//!     → flush loop (every flush interval)
//!     → sync subscriber
//!
//! Local mutation (create / update / delete):
//!     apply locally (one write-lock step on registry + tables)
//!     → persist to Store
//!     → publish on ConfigSyncChannel
//!
//! Foreign notification:
//!     → apply_remote → Store.get_config → apply_update (full replace)
//! ```
//!
//! # Design Decisions
//! - The only writer of the dispatch tables
//! - Update keeps the instance and its stats and swaps the routing state
//!   whole, so applying the same config twice is a no-op
//! - A persist failure is returned to the caller with the local change
//!   kept; a publish failure is only logged

mod flush;
pub mod listing;

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::schema::StatsConfig;
use crate::config::unit::ProxyConfig;
use crate::error::{GatewayError, Result, StoreError};
use crate::lifecycle::Shutdown;
use crate::load_balancer::random::{RandomSource, ThreadRandom};
use crate::load_balancer::selector::TargetSelector;
use crate::observability::metrics;
use crate::proxy::forward::Upstream;
use crate::proxy::instance::{ProxyInstance, RoutingState};
use crate::routing::dispatcher::Dispatcher;
use crate::routing::tables::{RoutingTables, SharedTables};
use crate::stats::sink::EventSink;
use crate::store::Store;
use crate::sync::channel::{ChangeHandler, ConfigSyncChannel};
use crate::sync::message::Operation;
use crate::sync::notifier::Notifier;

pub use listing::SortKey;

/// Stats flush timing.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    pub flush_interval: Duration,
    pub publish_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&StatsConfig::default())
    }
}

impl From<&StatsConfig> for SupervisorSettings {
    fn from(config: &StatsConfig) -> Self {
        Self {
            flush_interval: Duration::from_secs(config.flush_interval_secs),
            publish_timeout: Duration::from_secs(config.publish_timeout_secs),
        }
    }
}

pub struct Supervisor {
    tables: SharedTables,
    dispatcher: Dispatcher,
    store: Arc<dyn Store>,
    sink: Arc<dyn EventSink>,
    sync: Option<Arc<ConfigSyncChannel>>,
    random: Arc<dyn RandomSource>,
    settings: SupervisorSettings,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn EventSink>,
        upstream: Upstream,
        settings: SupervisorSettings,
    ) -> Self {
        let tables: SharedTables = Arc::new(RwLock::new(RoutingTables::new()));
        Self {
            dispatcher: Dispatcher::new(Arc::clone(&tables), upstream),
            tables,
            store,
            sink,
            sync: None,
            random: Arc::new(ThreadRandom),
            settings,
        }
    }

    /// Join the fleet through `notifier` under a fresh instance id.
    pub fn with_sync(self, notifier: Arc<dyn Notifier>) -> Self {
        self.with_sync_channel(ConfigSyncChannel::new(notifier))
    }

    pub fn with_sync_channel(mut self, channel: ConfigSyncChannel) -> Self {
        self.sync = Some(Arc::new(channel));
        self
    }

    /// Randomness used by every unit created from now on.
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Entry point for the shared listener.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Fleet instance id, when sync is enabled.
    pub fn instance_id(&self) -> Option<&str> {
        self.sync.as_deref().map(ConfigSyncChannel::instance_id)
    }

    fn read(&self) -> RwLockReadGuard<'_, RoutingTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoutingTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- local apply ------------------------------------------------------

    /// Validate, build and register a new unit.
    pub(crate) fn apply_create(&self, config: ProxyConfig) -> Result<Arc<ProxyInstance>> {
        let state = RoutingState::build(config)?;
        let key = state.key.clone();
        let instance = Arc::new(ProxyInstance::new(
            state,
            TargetSelector::new(Arc::clone(&self.random)),
        ));

        let count = {
            let mut tables = self.write();
            tables.insert(key.clone(), Arc::clone(&instance))?;
            instance.mark_started();
            tables.len()
        };
        metrics::set_routing_units(count);

        tracing::info!(unit_id = %instance.id(), key = %key, "Routing unit created");
        Ok(instance)
    }

    /// Replace a unit's routing state as a whole. With `upsert`, a missing
    /// unit is created instead of rejected.
    pub(crate) fn apply_update(&self, config: ProxyConfig, upsert: bool) -> Result<Arc<ProxyInstance>> {
        let state = RoutingState::build(config)?;
        let id = state.config.id.clone();
        let key = state.key.clone();

        let mut tables = self.write();
        let Some(instance) = tables.unit(&id).cloned() else {
            drop(tables);
            return if upsert {
                self.apply_create(state.config)
            } else {
                Err(GatewayError::NotFound(id))
            };
        };

        if *instance.snapshot() == state {
            tracing::debug!(unit_id = %id, "Routing unit unchanged");
            return Ok(instance);
        }

        tables.rebind(&id, key.clone())?;
        let previous = instance.replace(state);
        drop(tables);

        if previous.key != key {
            tracing::info!(unit_id = %id, from = %previous.key, to = %key, "Routing unit moved");
        }
        tracing::info!(unit_id = %id, "Routing unit updated");
        Ok(instance)
    }

    pub(crate) fn apply_delete(&self, id: &str) -> Result<Arc<ProxyInstance>> {
        let (removed, count) = {
            let mut tables = self.write();
            let removed = tables.remove(id);
            (removed, tables.len())
        };
        let removed = removed.ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        metrics::set_routing_units(count);

        tracing::info!(unit_id = %id, "Routing unit deleted");
        Ok(removed)
    }

    // ---- public operations ------------------------------------------------

    pub async fn create(&self, config: ProxyConfig) -> Result<()> {
        let id = config.id.clone();
        self.apply_create(config.clone())?;
        self.store.save_config(&config).await?;
        self.publish(&id, Operation::Create).await;
        Ok(())
    }

    pub async fn update(&self, config: ProxyConfig) -> Result<()> {
        let id = config.id.clone();
        self.apply_update(config.clone(), false)?;
        self.store.save_config(&config).await?;
        self.store.invalidate(&id).await?;
        self.publish(&id, Operation::Update).await;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.apply_delete(id)?;
        self.store.delete_config(id).await?;
        self.store.invalidate(id).await?;
        self.publish(id, Operation::Delete).await;
        Ok(())
    }

    async fn publish(&self, id: &str, operation: Operation) {
        let Some(sync) = &self.sync else {
            return;
        };
        if let Err(e) = sync.publish(id, operation).await {
            tracing::warn!(unit_id = %id, operation = %operation, error = %e, "Failed to publish change");
        }
    }

    /// Snapshot of every unit's config, sorted by `sort_key`
    /// (`id`, `listenKey`, `mode`, `targets`).
    pub fn list(&self, sort_key: &str, desc: bool) -> Vec<ProxyConfig> {
        let mut configs: Vec<ProxyConfig> = self
            .read()
            .units()
            .map(|instance| instance.snapshot().config.clone())
            .collect();
        listing::sort_configs(&mut configs, sort_key, desc);
        configs
    }

    /// Units carrying `tag`, ascending by id.
    pub fn list_by_tag(&self, tag: &str) -> Vec<ProxyConfig> {
        let mut configs = self.list("id", false);
        configs.retain(|config| config.tags.iter().any(|t| t == tag));
        configs
    }

    /// In-memory config of one unit.
    pub fn get(&self, id: &str) -> Option<ProxyConfig> {
        self.read().unit(id).map(|instance| instance.snapshot().config.clone())
    }

    pub fn instance(&self, id: &str) -> Option<Arc<ProxyInstance>> {
        self.read().unit(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Authoritative config from the store, falling back to the in-memory
    /// copy when the store is unreachable.
    pub async fn config(&self, id: &str) -> Result<ProxyConfig> {
        match self.store.get_config(id).await {
            Ok(config) => Ok(config),
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!(unit_id = %id, reason = %reason, "Store unavailable, serving last known config");
                self.get(id).ok_or_else(|| GatewayError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load persisted units, then start the flush loop and the sync subscriber.
    pub async fn start(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let configs = match self.store.get_all_configs().await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load routing units");
                Vec::new()
            }
        };

        for mut config in configs {
            match self.store.get_targets(&config.id).await {
                Ok(targets) => config.targets = targets,
                Err(e) => {
                    tracing::error!(unit_id = %config.id, error = %e, "Failed to load targets");
                    continue;
                }
            }
            let id = config.id.clone();
            if let Err(e) = self.apply_create(config) {
                tracing::error!(unit_id = %id, error = %e, "Failed to create routing unit");
            }
        }
        tracing::info!(units = self.len(), "Routing units loaded");

        let mut tasks = vec![self.spawn_flush_loop(shutdown)];

        if let Some(sync) = &self.sync {
            let handler: Arc<dyn ChangeHandler> = Arc::clone(self) as Arc<dyn ChangeHandler>;
            match sync.spawn_subscriber(handler, shutdown).await {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::error!(error = %e, "Failed to subscribe to change notifications"),
            }
        }
        tasks
    }
}

#[async_trait]
impl ChangeHandler for Supervisor {
    async fn apply_remote(&self, unit_id: &str, operation: Operation) -> Result<()> {
        if operation == Operation::Delete {
            return match self.apply_delete(unit_id) {
                Ok(_) | Err(GatewayError::NotFound(_)) => Ok(()),
                Err(e) => Err(e),
            };
        }

        self.store
            .invalidate(unit_id)
            .await
            .map_err(|e| GatewayError::Sync(format!("invalidate {unit_id}: {e}")))?;

        match self.store.get_config(unit_id).await {
            Ok(config) => self.apply_update(config, true).map(|_| ()),
            Err(StoreError::NotFound(_)) => {
                let _ = self.apply_delete(unit_id);
                Ok(())
            }
            Err(e) => Err(GatewayError::Sync(format!("re-fetch {unit_id}: {e}"))),
        }
    }
}
