//! Fleet configuration sync subsystem.
//!
//! # Data Flow
//! ```text
//! Local mutation (Supervisor create/update/delete)
//!     → channel.rs publish {routingUnitId, senderInstanceId, operation}
//!     → notifier.rs (shared pub/sub, best effort)
//!     → every peer's subscriber task
//!         - own sender id → dropped
//!         - foreign → ChangeHandler::apply_remote (re-fetch + full replace)
//! ```

pub mod channel;
pub mod message;
pub mod notifier;

pub use channel::{ChangeHandler, ConfigSyncChannel};
pub use message::{ChangeMessage, Operation};
pub use notifier::{Disconnected, LocalBus, Notifier};
