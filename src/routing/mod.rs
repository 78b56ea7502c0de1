//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → dispatcher.rs (read lock for the lookup only)
//!     → tables.rs (longest path prefix, then host)
//!     → matcher.rs (host normalization, prefix strip)
//!     → ProxyInstance or 400 / 404
//!
//! Registry changes (Supervisor only):
//!     create / update / delete
//!     → write lock on tables.rs
//!     → insert / rebind / remove as one step
//! ```
//!
//! # Design Decisions
//! - Tables are a derived view of the registry, written by the Supervisor alone
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same unit

pub mod dispatcher;
pub mod matcher;
pub mod tables;

pub use dispatcher::Dispatcher;
pub use matcher::{host_of, DispatchKey, PathPrefixMatcher};
pub use tables::{RoutingTables, SharedTables};
