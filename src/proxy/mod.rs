//! Routing unit subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → instance.rs (ProxyInstance: routing state snapshot + stats)
//!     → handler.rs (per-request state machine)
//!         - attribution.rs (RID/RRID/RUID, cookies, forwarded headers)
//!         - load_balancer selector (target choice)
//!         - forward.rs (reverse mode) or redirect / one internal re-dispatch
//!     → StatsCollector.record (exactly once per client request)
//! ```
//!
//! # Design Decisions
//! - Routing state is swapped whole; a request sees one consistent snapshot
//! - Stats live beside, not inside, the routing state and survive updates

pub mod attribution;
pub mod forward;
pub mod handler;
pub mod instance;

pub use attribution::Attribution;
pub use forward::{ForwardError, Upstream};
pub use handler::X_INTERNAL_REDIRECT;
pub use instance::{ProxyInstance, RoutingState};
