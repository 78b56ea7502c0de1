//! Change notification wire shape.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// "Routing unit `routing_unit_id` changed", broadcast to the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMessage {
    pub routing_unit_id: String,
    pub sender_instance_id: String,
    pub operation: Operation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let message = ChangeMessage {
            routing_unit_id: "checkout".into(),
            sender_instance_id: "node-1".into(),
            operation: Operation::Update,
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"routingUnitId":"checkout","senderInstanceId":"node-1","operation":"update"}"#
        );
        assert_eq!(serde_json::from_str::<ChangeMessage>(&json).unwrap(), message);
    }
}
