//! Order saga state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};

use super::{
    LineItem, OrderEnrichment, OrderEvent, OrderId, Stage,
    events::{CancellationData, SagaStartedData, StepFailedData},
};

/// A reversal that failed while unwinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationFailure {
    pub step_name: String,
    pub error: String,
}

/// A forward step that failed. Once recorded the saga only unwinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step_name: String,
    pub error: String,
}

/// State of one order saga instance.
///
/// Built exclusively by applying [`OrderEvent`]s. Once the stage is terminal
/// every further event is ignored, and the idempotency flags (`reserved`,
/// `payment_approved`, `charged`, `cancelled`) only ever go from false to
/// true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    order_id: Option<OrderId>,

    #[serde(default)]
    version: Version,

    stage: Stage,

    /// Cart in insertion order.
    items: Vec<LineItem>,

    reserved: bool,
    payment_approved: bool,
    charged: bool,
    cancelled: bool,

    last_error: Option<String>,

    #[serde(default)]
    failed_step: Option<StepFailure>,

    cancellation_reason: Option<String>,

    enrichment: Option<OrderEnrichment>,

    approval_deadline: Option<DateTime<Utc>>,

    approved_by: Option<String>,

    version_tag: Option<String>,

    /// Version markers keyed by decision ID.
    #[serde(default)]
    version_markers: BTreeMap<String, i32>,

    /// Reversals still pending, bottom to top.
    #[serde(default)]
    compensations: Vec<String>,

    /// Reversals that ran successfully, in execution order.
    #[serde(default)]
    compensated: Vec<String>,

    #[serde(default)]
    compensation_failures: Vec<CompensationFailure>,

    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Aggregate for OrderState {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "OrderSaga"
    }

    fn id(&self) -> Option<&AggregateId> {
        self.order_id.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if self.stage.is_terminal() {
            return;
        }

        match event {
            OrderEvent::SagaStarted(data) => self.apply_started(data),
            OrderEvent::StageEntered(data) => {
                if !data.stage.is_terminal() && self.stage.can_advance_to(data.stage) {
                    self.stage = data.stage;
                }
            }
            OrderEvent::VersionMarkerRecorded(data) => {
                self.version_markers
                    .entry(data.decision_id)
                    .or_insert(data.version);
                if self.version_tag.is_none() {
                    self.version_tag = Some(format!("v{}", data.version));
                }
            }
            OrderEvent::EnrichmentCompleted(enrichment) => {
                if self.enrichment.is_none() {
                    self.enrichment = Some(enrichment);
                }
            }
            OrderEvent::StockReserved(_) => self.reserved = true,
            OrderEvent::ApprovalDeadlineSet(data) => {
                if self.approval_deadline.is_none() {
                    self.approval_deadline = Some(data.deadline);
                }
            }
            OrderEvent::LineItemAdded(item) => {
                if self.stage == Stage::AwaitingApproval && !self.is_decided() {
                    self.items.push(item);
                }
            }
            OrderEvent::PaymentApproved(approval) => {
                if !self.is_decided() {
                    self.payment_approved = true;
                    self.approved_by = Some(approval.approved_by);
                }
            }
            OrderEvent::CancellationRequested(data) => self.apply_cancellation(data),
            OrderEvent::PaymentCharged(_) => self.charged = true,
            OrderEvent::CompensationRecorded(data) => self.compensations.push(data.step_name),
            OrderEvent::CompensationExecuted(data) => {
                self.remove_pending(&data.step_name);
                self.compensated.push(data.step_name);
            }
            OrderEvent::CompensationFailed(StepFailedData { step_name, error }) => {
                self.remove_pending(&step_name);
                self.compensation_failures
                    .push(CompensationFailure { step_name, error });
            }
            OrderEvent::StepFailed(StepFailedData { step_name, error }) => {
                self.last_error = Some(format!("{step_name} failed: {error}"));
                if self.failed_step.is_none() {
                    self.failed_step = Some(StepFailure { step_name, error });
                }
            }
            OrderEvent::NotificationFailed(data) => {
                self.last_error = Some(format!("{} failed: {}", data.step_name, data.error));
            }
            OrderEvent::SagaCompleted(data) => {
                self.stage = Stage::Completed;
                self.finished_at = Some(data.completed_at);
            }
            OrderEvent::SagaCancelled(data) => {
                self.stage = Stage::Cancelled;
                self.cancelled = true;
                if self.cancellation_reason.is_none() {
                    self.cancellation_reason = Some(data.reason.clone());
                }
                if self.last_error.is_none() {
                    self.last_error = Some(format!("cancelled: {}", data.reason));
                }
                self.finished_at = Some(data.cancelled_at);
            }
            OrderEvent::SagaFailed(data) => {
                self.stage = Stage::Failed;
                if self.last_error.is_none() {
                    self.last_error = Some(data.reason);
                }
                self.finished_at = Some(data.failed_at);
            }
        }
    }
}

impl SnapshotCapable for OrderState {
    /// Checkpoint at every stage transition so a resumed instance starts from
    /// its last stage without replaying the whole history.
    fn should_snapshot(&self, event: &OrderEvent) -> bool {
        matches!(
            event,
            OrderEvent::StageEntered(_)
                | OrderEvent::SagaCompleted(_)
                | OrderEvent::SagaCancelled(_)
                | OrderEvent::SagaFailed(_)
        )
    }
}

// Apply helpers
impl OrderState {
    fn apply_started(&mut self, data: SagaStartedData) {
        if self.order_id.is_some() {
            return;
        }
        self.order_id = Some(data.order_id);
        self.items = data.items;
        self.stage = Stage::Start;
        self.started_at = Some(data.started_at);
    }

    fn apply_cancellation(&mut self, data: CancellationData) {
        if self.is_decided() {
            return;
        }
        self.cancelled = true;
        self.cancellation_reason = Some(data.reason.clone());
        self.last_error = Some(if data.timed_out {
            data.reason
        } else {
            format!("cancelled: {}", data.reason)
        });
    }

    fn remove_pending(&mut self, step_name: &str) {
        if let Some(pos) = self.compensations.iter().rposition(|s| s == step_name) {
            self.compensations.remove(pos);
        }
    }
}

// Query methods
impl OrderState {
    /// Returns the order ID, or None before the saga started.
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the cart in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Returns the total quantity across all line items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn reserved(&self) -> bool {
        self.reserved
    }

    pub fn payment_approved(&self) -> bool {
        self.payment_approved
    }

    pub fn charged(&self) -> bool {
        self.charged
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns true once approval or cancellation has been recorded.
    pub fn is_decided(&self) -> bool {
        self.payment_approved || self.cancelled
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the forward step that failed, if any. A saga with a failed
    /// step never runs another forward step.
    pub fn failed_step(&self) -> Option<&StepFailure> {
        self.failed_step.as_ref()
    }

    /// Returns the reason given when the order was cancelled.
    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn enrichment(&self) -> Option<&OrderEnrichment> {
        self.enrichment.as_ref()
    }

    pub fn approval_deadline(&self) -> Option<DateTime<Utc>> {
        self.approval_deadline
    }

    pub fn approved_by(&self) -> Option<&str> {
        self.approved_by.as_deref()
    }

    /// Returns the branch tag chosen at the version gate (e.g. "v2").
    pub fn version_tag(&self) -> Option<&str> {
        self.version_tag.as_deref()
    }

    /// Returns the recorded branch version for a decision point.
    pub fn version_marker(&self, decision_id: &str) -> Option<i32> {
        self.version_markers.get(decision_id).copied()
    }

    /// Returns the pending reversal step names, bottom to top.
    pub fn pending_compensations(&self) -> &[String] {
        &self.compensations
    }

    /// Returns the reversals that ran, in execution order.
    pub fn compensated(&self) -> &[String] {
        &self.compensated
    }

    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        &self.compensation_failures
    }

    /// Returns true if the named reversal ran successfully.
    pub fn was_compensated(&self, step_name: &str) -> bool {
        self.compensated.iter().any(|s| s == step_name)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}
