//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router whose fallback is the Dispatcher
//! - Configure HTTP/1.1 and HTTP/2 support
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve every shared listener until shutdown, draining in-flight requests

use axum::{body::Body, extract::State, http::Request, response::Response, Router};
use futures_util::future::join_all;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::TimeoutConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::routing::dispatcher::Dispatcher;

/// HTTP server multiplexing every routing unit behind shared listeners.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(dispatcher: Dispatcher, timeouts: &TimeoutConfig) -> Self {
        Self {
            router: Self::build_router(dispatcher, timeouts.request()),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(dispatcher: Dispatcher, request_timeout: Duration) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(dispatcher)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The service, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on every listener until `shutdown` fires.
    pub async fn run(self, listeners: Vec<TcpListener>, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let servers = listeners.into_iter().map(|listener| {
            let app = self.router.clone();
            let signal = shutdown.signalled();
            async move {
                let addr = listener.local_addr()?;
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, app).with_graceful_shutdown(signal).await?;
                tracing::info!(address = %addr, "HTTP server stopped");
                Ok::<(), std::io::Error>(())
            }
        });

        for result in join_all(servers).await {
            result?;
        }
        Ok(())
    }
}

/// Hands every request to the Dispatcher.
async fn dispatch_handler(State(dispatcher): State<Dispatcher>, request: Request<Body>) -> Response {
    dispatcher.dispatch(request).await
}
