//! Saga coordinator and the per-order saga it drives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use domain::{
    Aggregate, DomainError, LineItem, OrderEnrichment, OrderError, OrderEvent, OrderId,
    OrderRepository, OrderState, Stage, StepFailure,
};
use event_store::{EventEnvelope, EventStore, EventStoreError};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::approval::{ApprovalEvent, ApprovalLoop};
use crate::compensation::{CompensationStack, Reversal};
use crate::error::{OperationError, Result, SagaError};
use crate::invoker::OperationInvoker;
use crate::options::SagaOptions;
use crate::order_fulfillment::{
    COMPENSATE_REFUND_PAYMENT, COMPENSATE_RELEASE_STOCK, CURRENT_VERSION, OP_CANCELLATION_EMAIL,
    OP_CUSTOMER_PROFILE, OP_INVENTORY_SNAPSHOT, OP_ORDER_CONFIRMATION, OP_PROCESS_PAYMENT,
    OP_RECOMMENDATIONS, OP_REFUND_PAYMENT, OP_RELEASE_STOCK, OP_RESERVE_STOCK,
    OP_UPDATE_ORDER_STATUS, STATUS_COMPLETED, STEP_CANCELLATION_EMAIL, STEP_CONFIRMATION,
    STEP_ENRICHMENT, STEP_PAYMENT, STEP_RESERVE_STOCK, STEP_STATUS_UPDATE, VERSION_DECISION_ID,
};
use crate::services::{
    CustomerService, InventoryService, NotificationService, OrderStatusService, PaymentService,
};
use crate::signals::{OrderSignal, SignalSender, signal_channel};
use crate::status::StatusProjector;
use crate::timer::{DurableTimer, TokioTimer};
use crate::version_gate::{BranchVersion, DEFAULT_VERSION, VersionGate};

/// External services a saga calls, shared by every instance.
#[derive(Clone)]
pub struct SagaServices {
    pub inventory: Arc<dyn InventoryService>,
    pub customer: Arc<dyn CustomerService>,
    pub payment: Arc<dyn PaymentService>,
    pub order_status: Arc<dyn OrderStatusService>,
    pub notification: Arc<dyn NotificationService>,
}

impl SagaServices {
    pub fn new(
        inventory: impl InventoryService + 'static,
        customer: impl CustomerService + 'static,
        payment: impl PaymentService + 'static,
        order_status: impl OrderStatusService + 'static,
        notification: impl NotificationService + 'static,
    ) -> Self {
        Self {
            inventory: Arc::new(inventory),
            customer: Arc::new(customer),
            payment: Arc::new(payment),
            order_status: Arc::new(order_status),
            notification: Arc::new(notification),
        }
    }
}

/// How a saga finished when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaOutcome {
    /// Every step succeeded.
    Completed {
        order_id: OrderId,
        version_tag: String,
    },
    /// The order was cancelled and its side effects compensated.
    Cancelled { order_id: OrderId, reason: String },
}

impl SagaOutcome {
    pub fn order_id(&self) -> &OrderId {
        match self {
            SagaOutcome::Completed { order_id, .. } | SagaOutcome::Cancelled { order_id, .. } => {
                order_id
            }
        }
    }

    /// Human readable summary of the result.
    pub fn message(&self) -> String {
        match self {
            SagaOutcome::Completed {
                order_id,
                version_tag,
            } => format!("Order {order_id} completed (version {version_tag})"),
            SagaOutcome::Cancelled { order_id, reason } => {
                format!("Order {order_id} cancelled: {reason}")
            }
        }
    }
}

/// Handle to a running saga instance.
///
/// Signals and status reads go through the handle while the saga runs on
/// its own task. Dropping the handle does not stop the saga.
#[derive(Debug)]
pub struct SagaHandle {
    order_id: OrderId,
    signals: SignalSender,
    status: StatusProjector,
    task: JoinHandle<Result<SagaOutcome>>,
}

impl SagaHandle {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn signals(&self) -> &SignalSender {
        &self.signals
    }

    pub fn status(&self) -> &StatusProjector {
        &self.status
    }

    /// Returns true once the saga task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the saga to finish and returns its result.
    pub async fn wait(self) -> Result<SagaOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(error) => Err(SagaError::Aborted {
                order_id: self.order_id,
                reason: error.to_string(),
            }),
        }
    }
}

/// Starts, resumes and inspects order fulfillment sagas.
///
/// Each saga runs on its own tokio task and checkpoints every state change
/// to the event store, so an unfinished instance can be resumed from its
/// history without repeating completed steps.
pub struct SagaCoordinator<S: EventStore> {
    repository: OrderRepository<S>,
    services: SagaServices,
    options: SagaOptions,
    timer: Arc<dyn DurableTimer>,
}

impl<S: EventStore + 'static> SagaCoordinator<S> {
    pub fn new(store: Arc<S>, services: SagaServices) -> Self {
        Self {
            repository: OrderRepository::new(store),
            services,
            options: SagaOptions::default(),
            timer: Arc::new(TokioTimer),
        }
    }

    pub fn with_options(mut self, options: SagaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn DurableTimer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn options(&self) -> &SagaOptions {
        &self.options
    }

    pub fn repository(&self) -> &OrderRepository<S> {
        &self.repository
    }

    /// Records a new saga for `order_id` and starts running it.
    ///
    /// Fails with [`SagaError::AlreadyStarted`] if the order already has
    /// history.
    #[tracing::instrument(skip(self, items), fields(order_id = %order_id, items = items.len()))]
    pub async fn start(&self, order_id: OrderId, items: Vec<LineItem>) -> Result<SagaHandle> {
        if order_id.is_blank() {
            return Err(OrderError::EmptyOrderId.into());
        }
        for item in &items {
            item.validate()?;
        }
        if self.repository.exists(&order_id).await? {
            return Err(SagaError::AlreadyStarted(order_id));
        }

        let mut state = OrderState::default();
        let started = OrderEvent::saga_started(order_id.clone(), items);
        match self.repository.append(&mut state, vec![started]).await {
            Ok(_) => {}
            Err(DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })) => {
                return Err(SagaError::AlreadyStarted(order_id));
            }
            Err(error) => return Err(error.into()),
        }

        tracing::info!("saga started");
        Ok(self.spawn(order_id, state))
    }

    /// Starts a saga and waits for it to finish.
    pub async fn run(&self, order_id: OrderId, items: Vec<LineItem>) -> Result<SagaOutcome> {
        self.start(order_id, items).await?.wait().await
    }

    /// Continues an unfinished saga from its recorded history.
    ///
    /// Completed forward steps are not repeated; pending compensations and
    /// the approval deadline are restored as recorded.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn resume(&self, order_id: &OrderId) -> Result<SagaHandle> {
        let Some(state) = self.repository.load(order_id).await? else {
            return Err(SagaError::OrderNotFound(order_id.clone()));
        };
        if state.is_terminal() {
            return Err(SagaError::InstanceClosed(order_id.clone()));
        }

        tracing::info!(stage = state.stage().as_str(), "saga resumed");
        Ok(self.spawn(order_id.clone(), state))
    }

    /// Loads the checkpointed state of an order, if it has any history.
    pub async fn load_state(&self, order_id: &OrderId) -> Result<Option<OrderState>> {
        Ok(self.repository.load(order_id).await?)
    }

    /// Returns every event recorded for an order.
    pub async fn history(&self, order_id: &OrderId) -> Result<Vec<EventEnvelope>> {
        Ok(self.repository.history(order_id).await?)
    }

    fn spawn(&self, order_id: OrderId, state: OrderState) -> SagaHandle {
        let invoker = self.options.invoker();
        let (signals, signal_rx) = signal_channel(order_id.clone());
        let (status_tx, status) = StatusProjector::channel(state.clone());

        let mut compensations = CompensationStack::new();
        for step_name in state.pending_compensations() {
            match reversal_for(step_name, &self.services, &invoker, &order_id) {
                Some(reversal) => compensations.record(step_name.clone(), reversal),
                None => tracing::warn!(step = %step_name, "no reversal known for recorded step"),
            }
        }

        let saga = OrderSaga {
            order_id: order_id.clone(),
            repository: self.repository.clone(),
            services: self.services.clone(),
            invoker,
            options: self.options.clone(),
            timer: Arc::clone(&self.timer),
            gate: VersionGate,
            state,
            compensations,
            approval: ApprovalLoop::new(signal_rx, Arc::clone(&self.timer)),
            status_tx,
        };
        let task = tokio::spawn(saga.run());

        SagaHandle {
            order_id,
            signals,
            status,
            task,
        }
    }
}

/// One saga instance. Owned by its task; every field change goes through
/// [`OrderSaga::record`].
struct OrderSaga<S: EventStore> {
    order_id: OrderId,
    repository: OrderRepository<S>,
    services: SagaServices,
    invoker: OperationInvoker,
    options: SagaOptions,
    timer: Arc<dyn DurableTimer>,
    gate: VersionGate,
    state: OrderState,
    compensations: CompensationStack,
    approval: ApprovalLoop,
    status_tx: watch::Sender<OrderState>,
}

impl<S: EventStore + 'static> OrderSaga<S> {
    #[tracing::instrument(name = "order_saga", skip(self), fields(order_id = %self.order_id))]
    async fn run(mut self) -> Result<SagaOutcome> {
        metrics::counter!("saga_executions_total").increment(1);
        let started = Instant::now();

        let result = self.drive().await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        match &result {
            Ok(outcome @ SagaOutcome::Completed { .. }) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(duration, message = %outcome.message(), "saga completed");
            }
            Ok(SagaOutcome::Cancelled { reason, .. }) => {
                metrics::counter!("saga_cancelled").increment(1);
                tracing::info!(duration, %reason, "saga cancelled");
            }
            Err(error) => {
                metrics::counter!("saga_failed").increment(1);
                tracing::warn!(duration, %error, kind = %error.kind(), "saga failed");
                if !self.state.is_terminal() {
                    // checkpointing itself failed; readers still see the end
                    self.state.apply(OrderEvent::saga_failed(error.to_string()));
                    self.status_tx.send_replace(self.state.clone());
                }
            }
        }

        result
    }

    async fn drive(&mut self) -> Result<SagaOutcome> {
        let pending_failure = self.state.failed_step().cloned();
        if let Some(failure) = pending_failure.filter(|_| !self.state.is_terminal()) {
            return self.finish_failure(failure).await;
        }

        loop {
            match self.state.stage() {
                Stage::Start => self.begin().await?,
                Stage::Enrichment => self.enrich().await?,
                Stage::Reserve => self.reserve().await?,
                Stage::AwaitingApproval => self.await_approval().await?,
                Stage::Payment => self.charge().await?,
                Stage::StatusUpdate => self.update_status().await?,
                Stage::Notify => self.notify().await?,
                Stage::Completed => {
                    let version_tag = match self.state.version_tag() {
                        Some(tag) => tag.to_string(),
                        None => BranchVersion::new(DEFAULT_VERSION).tag(),
                    };
                    return Ok(SagaOutcome::Completed {
                        order_id: self.order_id.clone(),
                        version_tag,
                    });
                }
                Stage::Cancelled => {
                    return Ok(SagaOutcome::Cancelled {
                        order_id: self.order_id.clone(),
                        reason: self.state.cancellation_reason().unwrap_or_default().to_string(),
                    });
                }
                Stage::Failed => return Err(SagaError::InstanceClosed(self.order_id.clone())),
            }
        }
    }

    /// Leaves START, recording the branch decision in the same append.
    async fn begin(&mut self) -> Result<()> {
        let decision = self.gate.resolve(
            &self.state,
            VERSION_DECISION_ID,
            DEFAULT_VERSION,
            CURRENT_VERSION,
        );

        let mut events = Vec::with_capacity(2);
        if decision.needs_marker {
            events.push(OrderEvent::version_marker(
                VERSION_DECISION_ID,
                decision.version.value(),
            ));
        }
        events.push(OrderEvent::stage_entered(Stage::Enrichment));
        self.record(events).await
    }

    async fn enrich(&mut self) -> Result<()> {
        let decision = self.gate.resolve(
            &self.state,
            VERSION_DECISION_ID,
            DEFAULT_VERSION,
            CURRENT_VERSION,
        );
        if decision.needs_marker {
            self.record(vec![OrderEvent::version_marker(
                VERSION_DECISION_ID,
                decision.version.value(),
            )])
            .await?;
        }
        tracing::debug!(version = %decision.version, "enrichment branch selected");

        let lookup = lookup_enrichment(
            &self.invoker,
            &self.services,
            &self.order_id,
            self.state.items(),
            decision.version,
        )
        .await;
        let enrichment = match lookup {
            Ok(enrichment) => enrichment,
            Err(error) => {
                return self
                    .fail(STEP_ENRICHMENT, SagaError::step_failed(STEP_ENRICHMENT, error))
                    .await;
            }
        };
        if !enrichment.inventory_ok {
            let error = SagaError::InsufficientInventory(self.order_id.clone());
            return self.fail(STEP_ENRICHMENT, error).await;
        }

        self.record(vec![
            OrderEvent::EnrichmentCompleted(enrichment),
            OrderEvent::stage_entered(Stage::Reserve),
        ])
        .await
    }

    async fn reserve(&mut self) -> Result<()> {
        let inventory = &self.services.inventory;
        let order_id = &self.order_id;
        let items = self.state.items();
        let reserved = self
            .invoker
            .invoke(OP_RESERVE_STOCK, move || inventory.reserve_stock(order_id, items))
            .await;
        if let Err(error) = reserved {
            let error = SagaError::step_failed(STEP_RESERVE_STOCK, error);
            return self.fail(STEP_RESERVE_STOCK, error).await;
        }

        self.push_compensation(COMPENSATE_RELEASE_STOCK);
        self.record(vec![
            OrderEvent::stock_reserved(),
            OrderEvent::compensation_recorded(COMPENSATE_RELEASE_STOCK),
            OrderEvent::stage_entered(Stage::AwaitingApproval),
        ])
        .await
    }

    /// Consumes signals and the deadline one at a time until the order is
    /// approved or cancelled.
    async fn await_approval(&mut self) -> Result<()> {
        let deadline = match self.state.approval_deadline() {
            Some(deadline) => deadline,
            None => {
                let deadline = deadline_after(self.timer.now(), self.options.approval_window);
                self.record(vec![OrderEvent::approval_deadline_set(deadline)])
                    .await?;
                deadline
            }
        };
        tracing::info!(%deadline, "awaiting payment approval");

        while !self.state.is_decided() {
            let event = match self.approval.next_event(deadline).await {
                ApprovalEvent::Signal(signal) => match signal_to_event(signal) {
                    Some(event) => event,
                    None => continue,
                },
                ApprovalEvent::DeadlineExpired => {
                    tracing::info!("approval deadline passed");
                    OrderEvent::approval_timed_out()
                }
            };
            self.record(vec![event]).await?;
        }

        if self.state.cancelled() {
            return self.cancel().await;
        }
        self.record(vec![OrderEvent::stage_entered(Stage::Payment)])
            .await
    }

    async fn cancel(&mut self) -> Result<()> {
        let reason = self
            .state
            .cancellation_reason()
            .unwrap_or_default()
            .to_string();
        tracing::info!(%reason, "cancelling order");

        self.compensate().await?;

        let notification = &self.services.notification;
        let order_id = &self.order_id;
        let reason_text = reason.as_str();
        let sent = self
            .invoker
            .invoke(OP_CANCELLATION_EMAIL, move || {
                notification.send_cancellation_email(order_id, reason_text)
            })
            .await;
        if let Err(error) = sent {
            tracing::warn!(step = STEP_CANCELLATION_EMAIL, %error, "cancellation email not sent");
        }

        self.record(vec![OrderEvent::saga_cancelled(reason)]).await
    }

    async fn charge(&mut self) -> Result<()> {
        let payment = &self.services.payment;
        let order_id = &self.order_id;
        let items = self.state.items();
        let charged = self
            .invoker
            .invoke(OP_PROCESS_PAYMENT, move || payment.process_payment(order_id, items))
            .await;
        match charged {
            Ok(receipt) => {
                tracing::info!(
                    payment_id = %receipt.payment_id,
                    items = receipt.items.len(),
                    "payment charged"
                );
            }
            Err(error) => {
                return self
                    .fail(STEP_PAYMENT, SagaError::step_failed(STEP_PAYMENT, error))
                    .await;
            }
        }

        self.push_compensation(COMPENSATE_REFUND_PAYMENT);
        self.record(vec![
            OrderEvent::payment_charged(),
            OrderEvent::compensation_recorded(COMPENSATE_REFUND_PAYMENT),
            OrderEvent::stage_entered(Stage::StatusUpdate),
        ])
        .await
    }

    async fn update_status(&mut self) -> Result<()> {
        let order_status = &self.services.order_status;
        let order_id = &self.order_id;
        let updated = self
            .invoker
            .invoke(OP_UPDATE_ORDER_STATUS, move || {
                order_status.update_order_status(order_id, STATUS_COMPLETED)
            })
            .await;
        if let Err(error) = updated {
            let error = SagaError::step_failed(STEP_STATUS_UPDATE, error);
            return self.fail(STEP_STATUS_UPDATE, error).await;
        }

        self.record(vec![OrderEvent::stage_entered(Stage::Notify)])
            .await
    }

    /// Sends the confirmation. A failure here is recorded but never fails
    /// the saga.
    async fn notify(&mut self) -> Result<()> {
        let notification = &self.services.notification;
        let order_id = &self.order_id;
        let email = self.options.notification_email.as_str();
        let sent = self
            .invoker
            .invoke(OP_ORDER_CONFIRMATION, move || {
                notification.send_order_confirmation(order_id, email)
            })
            .await;

        let mut events = Vec::with_capacity(2);
        if let Err(error) = sent {
            tracing::warn!(step = STEP_CONFIRMATION, %error, "order confirmation not sent");
            events.push(OrderEvent::notification_failed(
                STEP_CONFIRMATION,
                error.to_string(),
            ));
        }
        events.push(OrderEvent::saga_completed());
        self.record(events).await
    }

    /// Records a failed step, unwinds every completed step and ends the
    /// saga as failed.
    async fn fail<T>(&mut self, step: &'static str, error: SagaError) -> Result<T> {
        tracing::error!(step, %error, kind = %error.kind(), "saga step failed");

        let detail = match &error {
            SagaError::StepFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        self.record(vec![OrderEvent::step_failed(step, detail)])
            .await?;
        self.compensate().await?;
        self.record(vec![OrderEvent::saga_failed(error.to_string())])
            .await?;

        Err(error)
    }

    /// Finishes an instance whose failed step was recorded before it could
    /// end. The failed step is not retried.
    async fn finish_failure<T>(&mut self, failure: StepFailure) -> Result<T> {
        tracing::warn!(
            step = %failure.step_name,
            error = %failure.error,
            "resuming after recorded step failure"
        );
        let error = SagaError::step_failed(
            recorded_step(&failure.step_name),
            OperationError::permanent(failure.error),
        );

        self.compensate().await?;
        self.record(vec![OrderEvent::saga_failed(error.to_string())])
            .await?;

        Err(error)
    }

    async fn compensate(&mut self) -> Result<()> {
        if self.compensations.is_empty() {
            return Ok(());
        }
        tracing::info!(steps = self.compensations.len(), "compensating completed steps");

        let report = self.compensations.unwind_all().await;
        let events = report
            .steps
            .into_iter()
            .map(|step| match step.result {
                Ok(()) => OrderEvent::compensation_executed(step.step_name),
                Err(error) => OrderEvent::compensation_failed(step.step_name, error.to_string()),
            })
            .collect();
        self.record(events).await
    }

    fn push_compensation(&mut self, step_name: &str) {
        match reversal_for(step_name, &self.services, &self.invoker, &self.order_id) {
            Some(reversal) => self.compensations.record(step_name, reversal),
            None => tracing::warn!(step = step_name, "no reversal known for step"),
        }
    }

    /// Checkpoints `events` and publishes the new state.
    async fn record(&mut self, events: Vec<OrderEvent>) -> Result<()> {
        let previous = self.state.stage();
        self.repository.append(&mut self.state, events).await?;
        self.status_tx.send_replace(self.state.clone());

        let stage = self.state.stage();
        if stage != previous {
            tracing::info!(from = previous.as_str(), stage = stage.as_str(), "stage entered");
        }
        Ok(())
    }
}

/// Runs the enrichment lookups for the selected branch.
///
/// The current branch runs all three lookups concurrently and stops at the
/// first failure. Older instances only check inventory.
async fn lookup_enrichment(
    invoker: &OperationInvoker,
    services: &SagaServices,
    order_id: &OrderId,
    items: &[LineItem],
    version: BranchVersion,
) -> std::result::Result<OrderEnrichment, OperationError> {
    let inventory = &services.inventory;
    let customer = &services.customer;

    if version.value() < CURRENT_VERSION {
        let inventory_ok = invoker
            .invoke(OP_INVENTORY_SNAPSHOT, move || {
                inventory.fetch_inventory_snapshot(items)
            })
            .await?;
        return Ok(OrderEnrichment {
            inventory_ok,
            ..OrderEnrichment::default()
        });
    }

    let (inventory_ok, customer_tier, recommendations) = tokio::try_join!(
        invoker.invoke(OP_INVENTORY_SNAPSHOT, move || {
            inventory.fetch_inventory_snapshot(items)
        }),
        invoker.invoke(OP_CUSTOMER_PROFILE, move || {
            customer.fetch_customer_profile(order_id)
        }),
        invoker.invoke(OP_RECOMMENDATIONS, move || {
            customer.fetch_recommendations(order_id)
        }),
    )?;

    Ok(OrderEnrichment {
        customer_tier,
        inventory_ok,
        recommendations,
    })
}

/// Maps an inbound signal to the event it records. Invalid line items are
/// dropped.
fn signal_to_event(signal: OrderSignal) -> Option<OrderEvent> {
    match signal {
        OrderSignal::ApprovePayment(approval) => {
            tracing::info!(approved_by = %approval.approved_by, "payment approval received");
            Some(OrderEvent::PaymentApproved(approval))
        }
        OrderSignal::Cancel(request) => {
            tracing::info!(reason = %request.reason, "cancellation received");
            Some(OrderEvent::cancellation_requested(request.reason))
        }
        OrderSignal::AddLineItem(item) => match item.validate() {
            Ok(()) => {
                tracing::info!(sku = %item.sku, quantity = item.quantity, "line item added");
                Some(OrderEvent::LineItemAdded(item))
            }
            Err(error) => {
                tracing::warn!(%error, "line item rejected");
                None
            }
        },
    }
}

fn deadline_after(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Maps a recorded forward step name back to its constant.
fn recorded_step(step_name: &str) -> &'static str {
    match step_name {
        STEP_ENRICHMENT => STEP_ENRICHMENT,
        STEP_RESERVE_STOCK => STEP_RESERVE_STOCK,
        STEP_PAYMENT => STEP_PAYMENT,
        STEP_STATUS_UPDATE => STEP_STATUS_UPDATE,
        _ => "unknown_step",
    }
}

/// Builds the reversal for a recorded compensation step.
fn reversal_for(
    step_name: &str,
    services: &SagaServices,
    invoker: &OperationInvoker,
    order_id: &OrderId,
) -> Option<Reversal> {
    let invoker = invoker.clone();
    let order_id = order_id.clone();
    let reversal: Reversal = match step_name {
        COMPENSATE_RELEASE_STOCK => {
            let inventory = Arc::clone(&services.inventory);
            Box::new(move || {
                async move {
                    invoker
                        .invoke(OP_RELEASE_STOCK, || inventory.release_stock(&order_id))
                        .await
                }
                .boxed()
            })
        }
        COMPENSATE_REFUND_PAYMENT => {
            let payment = Arc::clone(&services.payment);
            Box::new(move || {
                async move {
                    invoker
                        .invoke(OP_REFUND_PAYMENT, || payment.refund_payment(&order_id))
                        .await
                }
                .boxed()
            })
        }
        _ => return None,
    };
    Some(reversal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CancelRequest, PaymentApproval};

    #[test]
    fn test_recorded_step_names() {
        assert_eq!(recorded_step("payment"), STEP_PAYMENT);
        assert_eq!(recorded_step("status_update"), STEP_STATUS_UPDATE);
        assert_eq!(recorded_step("teleport"), "unknown_step");
    }

    #[test]
    fn test_outcome_messages() {
        let completed = SagaOutcome::Completed {
            order_id: OrderId::new("order-1"),
            version_tag: "v2".to_string(),
        };
        assert_eq!(completed.message(), "Order order-1 completed (version v2)");

        let cancelled = SagaOutcome::Cancelled {
            order_id: OrderId::new("order-2"),
            reason: "approval timeout".to_string(),
        };
        assert_eq!(cancelled.message(), "Order order-2 cancelled: approval timeout");
        assert_eq!(cancelled.order_id(), &OrderId::new("order-2"));
    }

    #[test]
    fn test_deadline_after_adds_window() {
        let now = Utc::now();
        let deadline = deadline_after(now, Duration::from_secs(15 * 60));
        assert_eq!(deadline - now, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_deadline_after_saturates() {
        let deadline = deadline_after(Utc::now(), Duration::MAX);
        assert_eq!(deadline, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_signals_map_to_events() {
        let approved = signal_to_event(OrderSignal::ApprovePayment(PaymentApproval::new("ops")));
        assert!(matches!(approved, Some(OrderEvent::PaymentApproved(a)) if a.approved_by == "ops"));

        let cancelled = signal_to_event(OrderSignal::Cancel(CancelRequest::new("changed mind")));
        assert!(matches!(cancelled, Some(OrderEvent::CancellationRequested(_))));

        let item = LineItem::new("B", 1).unwrap();
        let added = signal_to_event(OrderSignal::AddLineItem(item.clone()));
        assert!(matches!(added, Some(OrderEvent::LineItemAdded(i)) if i == item));
    }

    #[test]
    fn test_invalid_line_item_signal_is_dropped() {
        let item = LineItem {
            sku: "B".into(),
            quantity: 0,
        };
        assert!(signal_to_event(OrderSignal::AddLineItem(item)).is_none());
    }

    #[test]
    fn test_unknown_compensation_has_no_reversal() {
        use crate::services::{
            InMemoryCustomerService, InMemoryInventoryService, InMemoryNotificationService,
            InMemoryOrderStatusService, InMemoryPaymentService,
        };

        let services = SagaServices::new(
            InMemoryInventoryService::new(),
            InMemoryCustomerService::new(),
            InMemoryPaymentService::new(),
            InMemoryOrderStatusService::new(),
            InMemoryNotificationService::new(),
        );
        let invoker = OperationInvoker::default();
        let order_id = OrderId::new("order-1");

        assert!(reversal_for("cancel_shipment", &services, &invoker, &order_id).is_none());
        assert!(reversal_for(COMPENSATE_RELEASE_STOCK, &services, &invoker, &order_id).is_some());
        assert!(reversal_for(COMPENSATE_REFUND_PAYMENT, &services, &invoker, &order_id).is_some());
    }
}
