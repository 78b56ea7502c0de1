//! Dispatch tables: host → unit and path prefix → unit, plus the unit registry.
//!
//! # Responsibilities
//! - Own the id → ProxyInstance registry and both lookup tables
//! - Enforce one owner per dispatch key
//! - Look up the unit for a host or a request path
//!
//! # Design Decisions
//! - O(1) host lookup via HashMap
//! - O(n) path prefix scan, longest prefix first, ties in lexicographic order
//! - Mutators are crate-private; only the Supervisor calls them

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{GatewayError, Result};
use crate::proxy::instance::ProxyInstance;
use crate::routing::matcher::{DispatchKey, PathPrefixMatcher};

/// Registry and dispatch tables behind one coarse lock.
pub type SharedTables = Arc<RwLock<RoutingTables>>;

#[derive(Debug, Clone)]
struct PathRoute {
    matcher: PathPrefixMatcher,
    unit_id: String,
}

#[derive(Debug, Default)]
pub struct RoutingTables {
    units: HashMap<String, Arc<ProxyInstance>>,
    keys: HashMap<DispatchKey, String>,
    hosts: HashMap<String, String>,
    paths: Vec<PathRoute>,
}

impl RoutingTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(&self, id: &str) -> Option<&Arc<ProxyInstance>> {
        self.units.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Arc<ProxyInstance>> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Id of the unit owning `key`.
    pub fn owner_of(&self, key: &DispatchKey) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Key currently bound to unit `id`.
    pub fn key_of(&self, id: &str) -> Option<&DispatchKey> {
        self.keys.iter().find(|(_, owner)| *owner == id).map(|(key, _)| key)
    }

    pub fn match_host(&self, host: &str) -> Option<&Arc<ProxyInstance>> {
        self.hosts.get(host).and_then(|id| self.units.get(id))
    }

    /// Longest registered prefix of `path`, with the prefix stripped.
    pub fn match_path<'p>(&self, path: &'p str) -> Option<(&Arc<ProxyInstance>, &'p str)> {
        self.paths.iter().find_map(|route| {
            let rest = route.matcher.strip(path)?;
            self.units.get(&route.unit_id).map(|unit| (unit, rest))
        })
    }

    /// Register a new unit under `key`.
    pub(crate) fn insert(&mut self, key: DispatchKey, instance: Arc<ProxyInstance>) -> Result<()> {
        let id = instance.id().to_string();
        if self.units.contains_key(&id) {
            return Err(GatewayError::Config(format!("routing unit {id} already exists")));
        }
        self.check_free(&key, &id)?;

        self.bind(key, &id);
        self.units.insert(id, instance);
        Ok(())
    }

    /// Move unit `id` from whatever key it owns to `key`.
    pub(crate) fn rebind(&mut self, id: &str, key: DispatchKey) -> Result<()> {
        self.check_free(&key, id)?;
        if let Some(old) = self.key_of(id).cloned() {
            if old == key {
                return Ok(());
            }
            self.unbind(&old);
        }
        self.bind(key, id);
        Ok(())
    }

    /// Remove unit `id` and its key.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Arc<ProxyInstance>> {
        if let Some(key) = self.key_of(id).cloned() {
            self.unbind(&key);
        }
        self.units.remove(id)
    }

    fn check_free(&self, key: &DispatchKey, id: &str) -> Result<()> {
        match self.owner_of(key) {
            Some(owner) if owner != id => Err(GatewayError::DuplicateRoute {
                key: key.to_string(),
                owner: owner.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn bind(&mut self, key: DispatchKey, id: &str) {
        match &key {
            DispatchKey::Host(host) => {
                self.hosts.insert(host.clone(), id.to_string());
            }
            DispatchKey::Path(path) => {
                self.paths.push(PathRoute {
                    matcher: PathPrefixMatcher::new(path),
                    unit_id: id.to_string(),
                });
                self.paths.sort_by(|a, b| {
                    let (a, b) = (a.matcher.prefix(), b.matcher.prefix());
                    b.len().cmp(&a.len()).then_with(|| a.cmp(b))
                });
            }
        }
        self.keys.insert(key, id.to_string());
    }

    fn unbind(&mut self, key: &DispatchKey) {
        match key {
            DispatchKey::Host(host) => {
                self.hosts.remove(host);
            }
            DispatchKey::Path(path) => {
                let prefix = PathPrefixMatcher::new(path);
                self.paths.retain(|route| route.matcher.prefix() != prefix.prefix());
            }
        }
        self.keys.remove(key);
    }
}
