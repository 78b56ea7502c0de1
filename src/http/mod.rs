//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (one or more shared listeners)
//!     → server.rs (Axum setup, HTTP/1.1 + HTTP/2)
//!     → request.rs (request ID)
//!     → routing::Dispatcher (unit lookup)
//!     → proxy handler (forward / redirect)
//!     → response.rs (hop-by-hop stripping, error bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
