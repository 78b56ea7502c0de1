//! Fleet-wide change propagation.
//!
//! # Responsibilities
//! - Broadcast `{routingUnitId, senderInstanceId, operation}` after a local mutation
//! - Receive foreign notifications and hand them to a `ChangeHandler`
//!
//! # Design Decisions
//! - Own messages are recognized by sender id and dropped
//! - A failed notification is logged and dropped; the loop keeps going
//! - Correctness relies on the handler being idempotent (full replace)

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::sync::message::{ChangeMessage, Operation};
use crate::sync::notifier::Notifier;

/// Applies a foreign change locally.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn apply_remote(&self, unit_id: &str, operation: Operation) -> Result<()>;
}

pub struct ConfigSyncChannel {
    instance_id: String,
    notifier: Arc<dyn Notifier>,
}

impl ConfigSyncChannel {
    /// Channel with a fresh random instance id.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_instance_id(uuid::Uuid::new_v4().to_string(), notifier)
    }

    pub fn with_instance_id(instance_id: impl Into<String>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            instance_id: instance_id.into(),
            notifier,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub async fn publish(&self, unit_id: &str, operation: Operation) -> Result<()> {
        let message = ChangeMessage {
            routing_unit_id: unit_id.to_string(),
            sender_instance_id: self.instance_id.clone(),
            operation,
        };
        let payload = serde_json::to_vec(&message).map_err(|e| GatewayError::Sync(e.to_string()))?;
        self.notifier.publish(payload).await?;

        tracing::debug!(unit_id = %unit_id, operation = %operation, "Change published");
        Ok(())
    }

    /// Subscribe now and process notifications on a background task until shutdown.
    pub async fn spawn_subscriber(
        self: &Arc<Self>,
        handler: Arc<dyn ChangeHandler>,
        shutdown: &Shutdown,
    ) -> Result<JoinHandle<()>> {
        let rx = self.notifier.subscribe().await?;
        let stop = shutdown.subscribe();
        let channel = Arc::clone(self);
        Ok(tokio::spawn(async move { channel.run(handler, rx, stop).await }))
    }

    async fn run(
        &self,
        handler: Arc<dyn ChangeHandler>,
        mut rx: broadcast::Receiver<Vec<u8>>,
        mut stop: broadcast::Receiver<()>,
    ) {
        tracing::info!(instance_id = %self.instance_id, "Sync subscriber started");
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                received = rx.recv() => match received {
                    Ok(payload) => self.handle(handler.as_ref(), &payload).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Sync subscriber lagged, notifications lost");
                        metrics::record_sync_message("lost");
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Sync channel closed");
                        break;
                    }
                },
            }
        }
        tracing::info!(instance_id = %self.instance_id, "Sync subscriber stopped");
    }

    async fn handle(&self, handler: &dyn ChangeHandler, payload: &[u8]) {
        let message: ChangeMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                let err = GatewayError::Sync(format!("undecodable notification: {e}"));
                tracing::warn!(error = %err, "Dropping notification");
                metrics::record_sync_message("failed");
                return;
            }
        };

        if message.sender_instance_id == self.instance_id {
            metrics::record_sync_message("ignored");
            return;
        }

        match handler.apply_remote(&message.routing_unit_id, message.operation).await {
            Ok(()) => {
                tracing::info!(
                    unit_id = %message.routing_unit_id,
                    operation = %message.operation,
                    sender = %message.sender_instance_id,
                    "Applied remote change"
                );
                metrics::record_sync_message("applied");
            }
            Err(e) => {
                tracing::warn!(
                    unit_id = %message.routing_unit_id,
                    operation = %message.operation,
                    error = %e,
                    "Dropping notification"
                );
                metrics::record_sync_message("failed");
            }
        }
    }
}
