//! Order saga events.
//!
//! Every change to an [`OrderState`](super::OrderState) is recorded as one of
//! these events, so the history of an order doubles as its checkpoint log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{LineItem, OrderEnrichment, OrderId, PaymentApproval, Stage};

/// Events recorded while an order saga runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// The saga was created with its initial cart.
    SagaStarted(SagaStartedData),

    /// The saga moved to a new non-terminal stage.
    StageEntered(StageEnteredData),

    /// The version gate recorded its branch decision.
    VersionMarkerRecorded(VersionMarkerData),

    /// Enrichment lookups finished.
    EnrichmentCompleted(OrderEnrichment),

    /// Stock was reserved.
    StockReserved(StepCompletedData),

    /// The approval deadline was fixed.
    ApprovalDeadlineSet(DeadlineData),

    /// A line item was added while awaiting approval.
    LineItemAdded(LineItem),

    /// Payment was approved.
    PaymentApproved(PaymentApproval),

    /// Cancellation was requested (explicitly or by the deadline).
    CancellationRequested(CancellationData),

    /// Payment was charged.
    PaymentCharged(StepCompletedData),

    /// A reversal was pushed onto the compensation stack.
    CompensationRecorded(CompensationData),

    /// A reversal ran successfully.
    CompensationExecuted(CompensationData),

    /// A reversal failed; unwinding continued.
    CompensationFailed(StepFailedData),

    /// A forward step failed.
    StepFailed(StepFailedData),

    /// The confirmation could not be sent (non-fatal).
    NotificationFailed(StepFailedData),

    /// The saga completed.
    SagaCompleted(SagaCompletedData),

    /// The saga was cancelled after compensation.
    SagaCancelled(SagaCancelledData),

    /// The saga failed after compensation.
    SagaFailed(SagaFailedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::SagaStarted(_) => "SagaStarted",
            OrderEvent::StageEntered(_) => "StageEntered",
            OrderEvent::VersionMarkerRecorded(_) => "VersionMarkerRecorded",
            OrderEvent::EnrichmentCompleted(_) => "EnrichmentCompleted",
            OrderEvent::StockReserved(_) => "StockReserved",
            OrderEvent::ApprovalDeadlineSet(_) => "ApprovalDeadlineSet",
            OrderEvent::LineItemAdded(_) => "LineItemAdded",
            OrderEvent::PaymentApproved(_) => "PaymentApproved",
            OrderEvent::CancellationRequested(_) => "CancellationRequested",
            OrderEvent::PaymentCharged(_) => "PaymentCharged",
            OrderEvent::CompensationRecorded(_) => "CompensationRecorded",
            OrderEvent::CompensationExecuted(_) => "CompensationExecuted",
            OrderEvent::CompensationFailed(_) => "CompensationFailed",
            OrderEvent::StepFailed(_) => "StepFailed",
            OrderEvent::NotificationFailed(_) => "NotificationFailed",
            OrderEvent::SagaCompleted(_) => "SagaCompleted",
            OrderEvent::SagaCancelled(_) => "SagaCancelled",
            OrderEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub order_id: OrderId,
    pub items: Vec<LineItem>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEnteredData {
    pub stage: Stage,
    pub entered_at: DateTime<Utc>,
}

/// Branch decision for a named fork point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMarkerData {
    pub decision_id: String,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineData {
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationData {
    pub reason: String,
    /// True when the approval deadline fired rather than an explicit signal.
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    pub step_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCancelledData {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl OrderEvent {
    pub fn saga_started(order_id: OrderId, items: Vec<LineItem>) -> Self {
        OrderEvent::SagaStarted(SagaStartedData {
            order_id,
            items,
            started_at: Utc::now(),
        })
    }

    pub fn stage_entered(stage: Stage) -> Self {
        OrderEvent::StageEntered(StageEnteredData {
            stage,
            entered_at: Utc::now(),
        })
    }

    pub fn version_marker(decision_id: impl Into<String>, version: i32) -> Self {
        OrderEvent::VersionMarkerRecorded(VersionMarkerData {
            decision_id: decision_id.into(),
            version,
        })
    }

    pub fn stock_reserved() -> Self {
        OrderEvent::StockReserved(StepCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn approval_deadline_set(deadline: DateTime<Utc>) -> Self {
        OrderEvent::ApprovalDeadlineSet(DeadlineData { deadline })
    }

    pub fn cancellation_requested(reason: impl Into<String>) -> Self {
        OrderEvent::CancellationRequested(CancellationData {
            reason: reason.into(),
            timed_out: false,
        })
    }

    pub fn approval_timed_out() -> Self {
        OrderEvent::CancellationRequested(CancellationData {
            reason: "approval timeout".to_string(),
            timed_out: true,
        })
    }

    pub fn payment_charged() -> Self {
        OrderEvent::PaymentCharged(StepCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn compensation_recorded(step_name: impl Into<String>) -> Self {
        OrderEvent::CompensationRecorded(CompensationData {
            step_name: step_name.into(),
        })
    }

    pub fn compensation_executed(step_name: impl Into<String>) -> Self {
        OrderEvent::CompensationExecuted(CompensationData {
            step_name: step_name.into(),
        })
    }

    pub fn compensation_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        OrderEvent::CompensationFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        OrderEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn notification_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        OrderEvent::NotificationFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn saga_completed() -> Self {
        OrderEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn saga_cancelled(reason: impl Into<String>) -> Self {
        OrderEvent::SagaCancelled(SagaCancelledData {
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        OrderEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(
            OrderEvent::stage_entered(Stage::Reserve).event_type(),
            "StageEntered"
        );
        assert_eq!(OrderEvent::stock_reserved().event_type(), "StockReserved");
        assert_eq!(
            OrderEvent::approval_timed_out().event_type(),
            "CancellationRequested"
        );
        assert_eq!(
            OrderEvent::compensation_failed("release_stock", "down").event_type(),
            "CompensationFailed"
        );
        assert_eq!(OrderEvent::saga_failed("x").event_type(), "SagaFailed");
    }

    #[test]
    fn test_adjacently_tagged_serialization() {
        let event = OrderEvent::compensation_recorded("refund_payment");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CompensationRecorded");
        assert_eq!(json["data"]["step_name"], "refund_payment");
    }

    #[test]
    fn test_line_item_added_payload() {
        let item = LineItem::new("B", 1).unwrap();
        let event = OrderEvent::LineItemAdded(item.clone());

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: OrderEvent = serde_json::from_str(&json).unwrap();

        match deserialized {
            OrderEvent::LineItemAdded(restored) => assert_eq!(restored, item),
            other => panic!("Expected LineItemAdded, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_cancellation_is_flagged() {
        match OrderEvent::approval_timed_out() {
            OrderEvent::CancellationRequested(data) => {
                assert!(data.timed_out);
                assert_eq!(data.reason, "approval timeout");
            }
            other => panic!("Expected CancellationRequested, got {other:?}"),
        }
    }
}
