//! Error taxonomy shared by every subsystem.

use thiserror::Error;

/// Why the selector could not choose a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Weighted selection found no active target.
    #[error("no active targets")]
    NoActiveTargets,
    /// A routing rule neither matched an active target nor resolved its default.
    #[error("no match")]
    NoMatch,
}

/// Failures reported by a configuration store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store has no configuration for this routing unit.
    #[error("routing unit {0} not found in store")]
    NotFound(String),
    /// Any transient failure (connection loss, timeout, decode error).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error type for the gateway core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or missing configuration; nothing was changed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The dispatch key is already owned by another routing unit.
    #[error("dispatch key {key} is already owned by routing unit {owner}")]
    DuplicateRoute { key: String, owner: String },

    /// No routing unit with this id is registered.
    #[error("routing unit {0} not found")]
    NotFound(String),

    #[error("target selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// A change notification could not be handled.
    #[error("sync notification failed: {0}")]
    Sync(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
