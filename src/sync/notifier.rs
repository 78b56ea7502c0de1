//! Publish/subscribe transport for change notifications.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{GatewayError, Result};

/// Best-effort fan-out: no delivery, ordering or deduplication guarantee.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> Result<()>;

    async fn subscribe(&self) -> Result<broadcast::Receiver<Vec<u8>>>;
}

/// In-process bus. Clones share one channel, so several supervisors in one
/// process behave like a fleet.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<Vec<u8>>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for LocalBus {
    async fn publish(&self, payload: Vec<u8>) -> Result<()> {
        // No subscriber is not an error: the message is simply lost.
        let _ = self.tx.send(payload);
        Ok(())
    }

    async fn subscribe(&self) -> Result<broadcast::Receiver<Vec<u8>>> {
        Ok(self.tx.subscribe())
    }
}

/// A notifier that is always down.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

#[async_trait]
impl Notifier for Disconnected {
    async fn publish(&self, _payload: Vec<u8>) -> Result<()> {
        Err(GatewayError::Sync("notifier disconnected".into()))
    }

    async fn subscribe(&self) -> Result<broadcast::Receiver<Vec<u8>>> {
        Err(GatewayError::Sync("notifier disconnected".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out() {
        let bus = LocalBus::default();
        let mut a = bus.subscribe().await.unwrap();
        let mut b = bus.clone().subscribe().await.unwrap();

        bus.publish(b"hello".to_vec()).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), b"hello");
        assert_eq!(b.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        assert!(LocalBus::new(1).publish(vec![1]).await.is_ok());
    }
}
