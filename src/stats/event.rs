//! Stats event wire shape.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::stats::collector::TargetStats;

/// One message per target per flush interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsEvent {
    pub routing_unit_id: String,
    pub target_id: String,
    /// Unix seconds at flush time.
    pub timestamp: u64,
    pub request_count: u64,
    pub error_count: u64,
    pub distinct_user_ids: Vec<String>,
}

impl StatsEvent {
    pub fn new(unit_id: &str, target_id: String, stats: TargetStats, at: SystemTime) -> Self {
        let mut users: Vec<String> = stats.distinct_users.into_iter().collect();
        users.sort();

        Self {
            routing_unit_id: unit_id.to_string(),
            target_id,
            timestamp: at.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs()),
            request_count: stats.request_count,
            error_count: stats.error_count,
            distinct_user_ids: users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wire_shape() {
        let stats = TargetStats {
            request_count: 3,
            error_count: 1,
            distinct_users: ["u2".to_string(), "u1".to_string()].into(),
            last_updated: None,
        };
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let event = StatsEvent::new("checkout", "A".into(), stats, at);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "routingUnitId": "checkout",
                "targetId": "A",
                "timestamp": 1_700_000_000u64,
                "requestCount": 3,
                "errorCount": 1,
                "distinctUserIds": ["u1", "u2"],
            })
        );
    }
}
