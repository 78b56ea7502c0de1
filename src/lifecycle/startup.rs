//! Listener binding.
//!
//! Failing to bind a shared listener is the only fatal startup error.

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
#[error("failed to bind {address}: {source}")]
pub struct ListenerError {
    pub address: String,
    #[source]
    pub source: std::io::Error,
}

/// Bind every configured address, in order.
pub async fn bind_listeners(config: &ListenerConfig) -> Result<Vec<TcpListener>, ListenerError> {
    let mut listeners = Vec::with_capacity(config.bind_addresses.len());
    for address in &config.bind_addresses {
        let listener = TcpListener::bind(address).await.map_err(|source| ListenerError {
            address: address.clone(),
            source,
        })?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(address = %local, "Listening for connections");
        }
        listeners.push(listener);
    }
    Ok(listeners)
}
