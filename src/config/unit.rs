//! Routing unit configuration.
//!
//! These types are the wire shape exchanged with the configuration store
//! (camelCase JSON) and the in-memory shape every `ProxyInstance` is built from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::routing::matcher::{host_of, DispatchKey};

fn default_true() -> bool {
    true
}

/// How a routing unit hands a request to its chosen target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Stream the request through to the target.
    #[default]
    Reverse,
    /// Redirect the client to the target.
    Redirect,
    /// Redirect, dispatched by path prefix.
    Path,
}

impl ProxyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMode::Reverse => "reverse",
            ProxyMode::Redirect => "redirect",
            ProxyMode::Path => "path",
        }
    }
}

/// Request signal a routing rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    Header,
    Query,
    Cookie,
    #[serde(rename = "user-agent", alias = "user_agent")]
    UserAgent,
    Language,
}

/// One backend endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Target {
    pub id: String,
    pub url: String,
    pub weight: f64,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Condition-based override mapping an observed signal value to a target id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    #[serde(rename = "type")]
    pub condition: ConditionType,

    /// Header, query parameter or cookie name; `platform` or `browser` for
    /// user-agent rules; unused for language rules.
    #[serde(default)]
    pub param_name: String,

    #[serde(default)]
    pub value_to_target: HashMap<String, String>,

    /// Target id used when the observed value is unmapped or its target is inactive.
    #[serde(default)]
    pub default: String,
}

/// Full configuration of one routing unit.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub id: String,

    /// Host the unit listens on (`host` or `host:port`).
    pub listen_key: String,

    #[serde(default)]
    pub mode: ProxyMode,

    /// Path-prefix key; when set the unit is dispatched by `/<pathKey>`
    /// instead of by host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_key: Option<String>,

    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RoutingRule>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_true")]
    pub active: bool,
}

impl ProxyConfig {
    /// The dispatch table entry this unit owns.
    pub fn dispatch_key(&self) -> DispatchKey {
        match self.path_key.as_deref().map(|k| k.trim_matches('/')) {
            Some(key) if !key.is_empty() => DispatchKey::Path(key.to_string()),
            _ => DispatchKey::Host(host_of(&self.listen_key)),
        }
    }

    /// Look up a target by id.
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }
}
