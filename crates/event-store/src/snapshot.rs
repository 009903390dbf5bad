use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, Result, Version};

/// A checkpoint of an aggregate's state at a specific version.
///
/// Saga instances save one at every stage transition; loading an instance
/// starts from the latest checkpoint and applies only the events after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "OrderSaga").
    pub aggregate_type: String,

    /// The version of the aggregate at the time of the snapshot.
    pub version: Version,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// The serialized aggregate state.
    pub state: serde_json::Value,
}

impl Snapshot {
    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        Ok(serde_json::from_value(self.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Checkpoint {
        stage: String,
        reserved: bool,
    }

    #[test]
    fn snapshot_from_state_and_into_state() {
        let original = Checkpoint {
            stage: "awaiting-approval".to_string(),
            reserved: true,
        };

        let snapshot = Snapshot::from_state(
            AggregateId::new("order-1"),
            "OrderSaga",
            Version::new(5),
            &original,
        )
        .unwrap();

        assert_eq!(snapshot.aggregate_type, "OrderSaga");
        assert_eq!(snapshot.version, Version::new(5));

        let restored: Checkpoint = snapshot.into_state().unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn into_state_rejects_mismatched_shape() {
        let snapshot = Snapshot::from_state(
            AggregateId::new("order-1"),
            "OrderSaga",
            Version::first(),
            &serde_json::json!({"unexpected": 1}),
        )
        .unwrap();

        let restored: Result<Checkpoint> = snapshot.into_state();
        assert!(restored.is_err());
    }
}
