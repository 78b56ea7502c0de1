//! Configuration store collaborator.
//!
//! # Data Flow
//! ```text
//! Supervisor startup      → get_all_configs + get_targets(id)
//! Supervisor mutation     → save_config / delete_config + invalidate(id)
//! Peer notification       → get_config(id) (authoritative re-fetch)
//! ```
//!
//! # Design Decisions
//! - `StoreError::NotFound` is authoritative; anything else is transient
//! - The bundled store is in-process and cloneable so several supervisors
//!   can share it like a fleet shares one database

pub mod memory;

use async_trait::async_trait;

use crate::config::unit::{ProxyConfig, Target};
use crate::error::StoreError;

pub use memory::MemoryStore;

/// Authoritative routing unit configuration shared by the fleet.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_all_configs(&self) -> Result<Vec<ProxyConfig>, StoreError>;

    async fn get_config(&self, id: &str) -> Result<ProxyConfig, StoreError>;

    /// Insert or replace.
    async fn save_config(&self, config: &ProxyConfig) -> Result<(), StoreError>;

    async fn delete_config(&self, id: &str) -> Result<(), StoreError>;

    /// Drop any cached copy of `id`; the next read goes to the backing data.
    async fn invalidate(&self, id: &str) -> Result<(), StoreError>;

    async fn get_targets(&self, id: &str) -> Result<Vec<Target>, StoreError>;
}
