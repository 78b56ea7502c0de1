//! Target selection subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (headers, cookies, query)
//!     → signals.rs (parse once, user-agent / language heuristics)
//!     → selector.rs (affinity → rule → weighted random)
//!         - random.rs (injected uniform draws)
//!     → chosen Target or SelectionError
//!
//! Unit build / update:
//!     ProxyConfig.targets → weights.rs (normalize to sum 1)
//! ```
//!
//! # Design Decisions
//! - Selection is a pure function of the request and a state snapshot
//! - Randomness is injected so tests can be deterministic
//! - Inactive targets are never chosen, whatever the path

pub mod random;
pub mod selector;
pub mod signals;
pub mod weights;

pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use selector::{affinity_cookie_name, TargetSelector};
pub use signals::RequestSignals;
pub use weights::normalize_weights;
