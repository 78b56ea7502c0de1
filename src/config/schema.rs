//! Gateway settings schema.
//!
//! Process-level settings for one gateway instance. Routing units live in
//! [`crate::config::unit`]; the `units` table here only seeds the bundled
//! in-process store.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::unit::ProxyConfig;

/// Root configuration for a gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Shared listener settings.
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Stats flush settings.
    pub stats: StatsConfig,

    /// Fleet change-notification settings.
    pub sync: SyncConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routing units loaded into the store at startup.
    pub units: Vec<ProxyConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind addresses (e.g., "0.0.0.0:8080"). Every address serves every unit.
    pub bind_addresses: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addresses: vec!["0.0.0.0:8080".to_string()],
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on waiting for an upstream response, in seconds.
    pub upstream_secs: u64,

    /// Bound on the whole inbound request, in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_secs: 10,
            request_secs: 30,
        }
    }
}

/// Stats flush configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Interval between flushes, in seconds.
    pub flush_interval_secs: u64,

    /// Bound on a single event publish, in seconds.
    pub publish_timeout_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 10,
            publish_timeout_secs: 5,
        }
    }
}

/// Change-notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Subscribe to and publish fleet change notifications.
    pub enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
