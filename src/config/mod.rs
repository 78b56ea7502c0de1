//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors at once)
//!     → GatewayConfig (process settings + store seed)
//!
//! Routing unit config (store / admin)
//!     → unit.rs (ProxyConfig, camelCase wire shape)
//!     → validation.rs (validate_unit, rejected before registration)
//!     → supervisor builds or replaces a ProxyInstance
//! ```
//!
//! # Design Decisions
//! - Process settings are immutable once loaded
//! - Routing units change live; every change is a full replacement
//! - All settings have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod unit;
pub mod validation;

pub use schema::{GatewayConfig, ListenerConfig, ObservabilityConfig, StatsConfig, SyncConfig, TimeoutConfig};
pub use unit::{ConditionType, ProxyConfig, ProxyMode, RoutingRule, Target};
