//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of gateway settings (serde handles syntactic)
//! - Semantic validation of routing units before they are registered
//! - Referential integrity: rule targets must exist in the unit's target list
//!
//! # Design Decisions
//! - Gateway settings report all errors, not just the first
//! - Unit validation stops at the first problem; the unit is rejected as a whole

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::config::unit::{ProxyConfig, ProxyMode};
use crate::error::GatewayError;
use crate::routing::matcher::host_of;

/// A single problem found in the gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate gateway settings, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_addresses.is_empty() {
        errors.push(ValidationError::new(
            "listener.bind_addresses",
            "at least one bind address is required",
        ));
    }
    for addr in &config.listener.bind_addresses {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "listener.bind_addresses",
                format!("invalid socket address {addr:?}"),
            ));
        }
    }

    let positive = [
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("stats.flush_interval_secs", config.stats.flush_interval_secs),
        ("stats.publish_timeout_secs", config.stats.publish_timeout_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    // The request timeout must outlast the upstream timeout, or a timed-out
    // upstream call is cut off before it is recorded.
    let timeouts = &config.timeouts;
    if timeouts.upstream_secs > 0
        && timeouts.request_secs > 0
        && timeouts.request_secs <= timeouts.upstream_secs
    {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            format!(
                "must be greater than timeouts.upstream_secs ({})",
                timeouts.upstream_secs
            ),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "invalid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one routing unit before it is built.
pub fn validate_unit(cfg: &ProxyConfig) -> Result<(), GatewayError> {
    let invalid = |msg: String| Err(GatewayError::Config(msg));

    if cfg.id.trim().is_empty() {
        return invalid("routing unit id is required".into());
    }
    if cfg.listen_key.trim().is_empty() || host_of(&cfg.listen_key).is_empty() {
        return invalid(format!("unit {}: listen key is required", cfg.id));
    }
    if cfg.mode == ProxyMode::Path
        && cfg.path_key.as_deref().map_or(true, |k| k.trim_matches('/').is_empty())
    {
        return invalid(format!("unit {}: path mode requires a path key", cfg.id));
    }
    if cfg.targets.is_empty() {
        return invalid(format!("unit {}: at least one target is required", cfg.id));
    }

    let mut ids = HashSet::new();
    for target in &cfg.targets {
        if target.id.is_empty() {
            return invalid(format!("unit {}: target id is required", cfg.id));
        }
        if target.url.trim().is_empty() {
            return invalid(format!("unit {}: target {} has no url", cfg.id, target.id));
        }
        if !target.weight.is_finite() || target.weight < 0.0 {
            return invalid(format!(
                "unit {}: target {} weight must be non-negative",
                cfg.id, target.id
            ));
        }
        if !ids.insert(target.id.as_str()) {
            return invalid(format!("unit {}: duplicate target id {}", cfg.id, target.id));
        }
    }

    if let Some(rule) = &cfg.rule {
        let referenced = rule
            .value_to_target
            .values()
            .chain(std::iter::once(&rule.default))
            .filter(|id| !id.is_empty());
        for id in referenced {
            if !ids.contains(id.as_str()) {
                return invalid(format!("unit {}: rule references unknown target {}", cfg.id, id));
            }
        }
    }

    Ok(())
}
