//! Per-target request counters of one routing unit.
//!
//! # Design Decisions
//! - One mutex per unit, never held across an await and never shared with
//!   the routing state, so stat writes never contend with selection
//! - Flushing swaps the whole map out under the lock: an increment lands
//!   either in the drained snapshot or in the fresh map, never both

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// Terminal state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed,
}

/// Counters for one target since the last flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetStats {
    pub request_count: u64,
    pub error_count: u64,
    pub distinct_users: HashSet<String>,
    pub last_updated: Option<SystemTime>,
}

impl TargetStats {
    pub fn is_zero(&self) -> bool {
        self.request_count == 0 && self.error_count == 0 && self.distinct_users.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct StatsCollector {
    targets: Mutex<HashMap<String, TargetStats>>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TargetStats>> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one terminal request. `target_id` is the unit id when
    /// selection itself failed.
    pub fn record(&self, target_id: &str, user_id: &str, outcome: Outcome) {
        let mut targets = self.lock();
        let stats = targets.entry(target_id.to_string()).or_default();
        stats.request_count += 1;
        if outcome == Outcome::Failed {
            stats.error_count += 1;
        }
        if !user_id.is_empty() && !stats.distinct_users.contains(user_id) {
            stats.distinct_users.insert(user_id.to_string());
        }
        stats.last_updated = Some(SystemTime::now());
    }

    /// Counters of one target; zero when nothing was recorded since the last drain.
    pub fn target(&self, target_id: &str) -> TargetStats {
        self.lock().get(target_id).cloned().unwrap_or_default()
    }

    /// Copy of every counter, leaving them in place.
    pub fn snapshot(&self) -> HashMap<String, TargetStats> {
        self.lock().clone()
    }

    /// Take every counter and reset to zero in one step.
    pub fn drain(&self) -> HashMap<String, TargetStats> {
        std::mem::take(&mut *self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_counts() {
        let stats = StatsCollector::new();
        stats.record("A", "u1", Outcome::Completed);
        stats.record("A", "u1", Outcome::Failed);
        stats.record("A", "u2", Outcome::Completed);
        stats.record("B", "", Outcome::Completed);

        let a = stats.target("A");
        assert_eq!(a.request_count, 3);
        assert_eq!(a.error_count, 1);
        assert_eq!(a.distinct_users.len(), 2);
        assert!(a.last_updated.is_some());

        let b = stats.target("B");
        assert_eq!(b.request_count, 1);
        assert!(b.distinct_users.is_empty());
    }

    #[test]
    fn test_drain_resets_to_zero() {
        let stats = StatsCollector::new();
        for _ in 0..25 {
            stats.record("T", "u", Outcome::Completed);
        }

        let drained = stats.drain();
        assert_eq!(drained["T"].request_count, 25);
        assert!(stats.target("T").is_zero());
        assert!(stats.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_records_are_not_lost_across_drains() {
        let stats = Arc::new(StatsCollector::new());
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        stats.record("T", &format!("u{i}"), Outcome::Completed);
                    }
                })
            })
            .collect();

        let mut total = 0;
        for _ in 0..50 {
            total += stats.drain().get("T").map_or(0, |s| s.request_count);
        }
        for writer in writers {
            writer.join().unwrap();
        }
        total += stats.drain().get("T").map_or(0, |s| s.request_count);

        assert_eq!(total, 8_000);
    }
}
