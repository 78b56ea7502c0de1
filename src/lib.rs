//! Live traffic-splitting gateway library.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod stats;
pub mod store;
pub mod supervisor;
pub mod sync;

pub use config::schema::GatewayConfig;
pub use config::unit::ProxyConfig;
pub use error::{GatewayError, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use supervisor::{Supervisor, SupervisorSettings};
