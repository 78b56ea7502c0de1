//! Statistics subsystem.
//!
//! # Data Flow
//! ```text
//! Terminal request state (COMPLETED / FAILED)
//!     → collector.rs (per-target counters, one lock per unit)
//!
//! Supervisor flush tick (every flush interval)
//!     → collector.drain() (snapshot + reset in one step)
//!     → event.rs (one StatsEvent per target)
//!     → sink.rs (external event stream)
//! ```

pub mod collector;
pub mod event;
pub mod sink;

pub use collector::{Outcome, StatsCollector, TargetStats};
pub use event::StatsEvent;
pub use sink::{ChannelSink, EventSink, LogSink, SinkError};
