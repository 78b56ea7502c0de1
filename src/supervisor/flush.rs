//! Periodic stats flush.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::instance::ProxyInstance;
use crate::stats::event::StatsEvent;
use crate::supervisor::Supervisor;

impl Supervisor {
    pub(super) fn spawn_flush_loop(self: &Arc<Self>, shutdown: &Shutdown) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut stop = shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.settings.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            tracing::info!(interval = ?this.settings.flush_interval, "Stats flush loop started");
            loop {
                tokio::select! {
                    _ = stop.recv() => {
                        this.flush_stats().await;
                        break;
                    }
                    _ = ticker.tick() => {
                        this.flush_stats().await;
                    }
                }
            }
            tracing::info!("Stats flush loop stopped");
        })
    }

    /// Drain every started unit's counters and publish one event per target.
    /// Units flush concurrently; a slow or failing publish only affects its own events.
    /// Returns the number of events published.
    pub async fn flush_stats(&self) -> usize {
        let instances: Vec<Arc<ProxyInstance>> = self
            .read()
            .units()
            .filter(|instance| instance.is_started())
            .cloned()
            .collect();

        let now = SystemTime::now();
        join_all(instances.iter().map(|instance| self.flush_instance(instance, now)))
            .await
            .into_iter()
            .sum()
    }

    async fn flush_instance(&self, instance: &ProxyInstance, now: SystemTime) -> usize {
        let mut published = 0;
        for (target_id, stats) in instance.stats().drain() {
            let event = StatsEvent::new(instance.id(), target_id, stats, now);
            let target_id = event.target_id.clone();

            match tokio::time::timeout(self.settings.publish_timeout, self.sink.publish(event)).await {
                Ok(Ok(())) => published += 1,
                Ok(Err(e)) => {
                    tracing::warn!(unit_id = %instance.id(), target_id = %target_id, error = %e, "Failed to publish stats");
                    metrics::record_publish_failure(instance.id());
                }
                Err(_) => {
                    tracing::warn!(unit_id = %instance.id(), target_id = %target_id, "Stats publish timed out");
                    metrics::record_publish_failure(instance.id());
                }
            }
        }
        published
    }
}
