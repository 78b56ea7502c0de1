//! External event stream for flushed stats.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::stats::event::StatsEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event stream closed")]
    Closed,
    #[error("event stream unavailable: {0}")]
    Unavailable(String),
}

/// Destination of stats events, one call per target per flush.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: StatsEvent) -> Result<(), SinkError>;
}

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, event: StatsEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&event).map_err(|e| SinkError::Unavailable(e.to_string()))?;
        tracing::info!(
            target: "split_gateway::stats",
            unit_id = %event.routing_unit_id,
            target_id = %event.target_id,
            requests = event.request_count,
            errors = event.error_count,
            event = %payload,
            "Stats flushed"
        );
        Ok(())
    }
}

/// Hands events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<StatsEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StatsEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: StatsEvent) -> Result<(), SinkError> {
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> StatsEvent {
        StatsEvent {
            routing_unit_id: "u1".into(),
            target_id: "A".into(),
            timestamp: 0,
            request_count: 1,
            error_count: 0,
            distinct_user_ids: vec![],
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.publish(event()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().target_id, "A");
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new(4);
        drop(rx);
        assert!(matches!(sink.publish(event()).await, Err(SinkError::Closed)));
    }
}
