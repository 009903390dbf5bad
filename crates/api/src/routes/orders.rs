//! Saga start, signal and status endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{CompensationFailure, LineItem, OrderEnrichment, OrderId, OrderState, Stage};
use event_store::EventStore;
use saga::{SagaCoordinator, SagaError, SagaHandle, SignalSender, StatusProjector};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
///
/// Handles of sagas started or resumed by this server are kept while they
/// run so later requests can signal and observe them. Finished handles are
/// dropped; their final state is read back from the event store.
pub struct AppState<S: EventStore> {
    coordinator: SagaCoordinator<S>,
    sagas: RwLock<HashMap<OrderId, SagaHandle>>,
}

impl<S: EventStore + 'static> AppState<S> {
    pub fn new(coordinator: SagaCoordinator<S>) -> Self {
        Self {
            coordinator,
            sagas: RwLock::new(HashMap::new()),
        }
    }

    pub fn coordinator(&self) -> &SagaCoordinator<S> {
        &self.coordinator
    }

    /// Starts a saga and keeps its handle.
    pub async fn start(&self, order_id: OrderId, items: Vec<LineItem>) -> Result<Stage, SagaError> {
        let handle = self.coordinator.start(order_id.clone(), items).await?;
        let stage = handle.status().stage();

        let mut sagas = self.sagas.write().await;
        sagas.retain(|_, handle| !handle.is_finished());
        sagas.insert(order_id, handle);
        Ok(stage)
    }

    /// Returns the signal sender for an order, resuming the saga from its
    /// history if this server is not running it.
    pub async fn signals(&self, order_id: &OrderId) -> Result<SignalSender, SagaError> {
        if let Some(signals) = self.live(order_id, |h| h.signals().clone()).await {
            return Ok(signals);
        }

        let mut sagas = self.sagas.write().await;
        match sagas.get(order_id) {
            Some(handle) if !handle.is_finished() => return Ok(handle.signals().clone()),
            Some(_) => {
                sagas.remove(order_id);
            }
            None => {}
        }
        let handle = self.coordinator.resume(order_id).await?;
        let signals = handle.signals().clone();
        sagas.insert(order_id.clone(), handle);
        Ok(signals)
    }

    /// Returns the latest state of an order, live if the saga runs here.
    pub async fn snapshot(&self, order_id: &OrderId) -> Result<OrderState, SagaError> {
        if let Some(state) = self.live(order_id, |h| h.status().snapshot()).await {
            return Ok(state);
        }
        self.forget_finished(order_id).await;

        self.coordinator
            .load_state(order_id)
            .await?
            .ok_or_else(|| SagaError::OrderNotFound(order_id.clone()))
    }

    /// Returns (tracked, running) saga counts.
    pub async fn saga_counts(&self) -> (usize, usize) {
        let sagas = self.sagas.read().await;
        let running = sagas.values().filter(|h| !h.is_finished()).count();
        (sagas.len(), running)
    }

    /// Returns the status projector of a saga tracked by this server.
    pub async fn status(&self, order_id: &OrderId) -> Option<StatusProjector> {
        self.sagas
            .read()
            .await
            .get(order_id)
            .map(|h| h.status().clone())
    }

    async fn live<T>(&self, order_id: &OrderId, f: impl FnOnce(&SagaHandle) -> T) -> Option<T> {
        let sagas = self.sagas.read().await;
        sagas.get(order_id).filter(|h| !h.is_finished()).map(f)
    }

    async fn forget_finished(&self, order_id: &OrderId) {
        let mut sagas = self.sagas.write().await;
        if sagas.get(order_id).is_some_and(|h| h.is_finished()) {
            sagas.remove(order_id);
            tracing::debug!(%order_id, "finished saga handle dropped");
        }
    }
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct StartOrderRequest {
    /// Caller-assigned order ID; generated when absent.
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub sku: String,
    pub quantity: u32,
}

impl LineItemRequest {
    fn into_line_item(self) -> Result<LineItem, ApiError> {
        Ok(LineItem::new(self.sku, self.quantity)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub approved_by: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderStartedResponse {
    pub order_id: String,
    pub stage: Stage,
}

#[derive(Serialize)]
pub struct SignalAcceptedResponse {
    pub order_id: String,
    pub signal: &'static str,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub stage: Stage,
    pub items: Vec<LineItem>,
    pub reserved: bool,
    pub payment_approved: bool,
    pub charged: bool,
    pub cancelled: bool,
    pub approved_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub last_error: Option<String>,
    pub version_tag: Option<String>,
    pub enrichment: Option<OrderEnrichment>,
    pub approval_deadline: Option<DateTime<Utc>>,
    pub compensated: Vec<String>,
    pub compensation_failures: Vec<CompensationFailure>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OrderStatusResponse {
    fn from_state(order_id: &OrderId, state: &OrderState) -> Self {
        Self {
            order_id: order_id.to_string(),
            stage: state.stage(),
            items: state.items().to_vec(),
            reserved: state.reserved(),
            payment_approved: state.payment_approved(),
            charged: state.charged(),
            cancelled: state.cancelled(),
            approved_by: state.approved_by().map(String::from),
            cancellation_reason: state.cancellation_reason().map(String::from),
            last_error: state.last_error().map(String::from),
            version_tag: state.version_tag().map(String::from),
            enrichment: state.enrichment().cloned(),
            approval_deadline: state.approval_deadline(),
            compensated: state.compensated().to_vec(),
            compensation_failures: state.compensation_failures().to_vec(),
            started_at: state.started_at(),
            finished_at: state.finished_at(),
        }
    }
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /orders — start a saga for a new order.
#[tracing::instrument(skip(state, req))]
pub async fn start<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<StartOrderRequest>,
) -> Result<(StatusCode, Json<OrderStartedResponse>), ApiError> {
    let order_id = match req.order_id {
        Some(id) => OrderId::new(id),
        None => OrderId::generate(),
    };
    let items = req
        .items
        .into_iter()
        .map(LineItemRequest::into_line_item)
        .collect::<Result<Vec<_>, _>>()?;

    let stage = state.start(order_id.clone(), items).await?;

    let response = OrderStartedResponse {
        order_id: order_id.to_string(),
        stage,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /orders/{id}/approve — approve payment for an order.
#[tracing::instrument(skip(state, req))]
pub async fn approve<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> Result<(StatusCode, Json<SignalAcceptedResponse>), ApiError> {
    let order_id = OrderId::new(id);
    state
        .signals(&order_id)
        .await?
        .approve_payment(req.approved_by)?;
    Ok(accepted(&order_id, "approve-payment"))
}

/// POST /orders/{id}/cancel — request cancellation of an order.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<(StatusCode, Json<SignalAcceptedResponse>), ApiError> {
    let order_id = OrderId::new(id);
    state.signals(&order_id).await?.cancel_order(req.reason)?;
    Ok(accepted(&order_id, "cancel-order"))
}

/// POST /orders/{id}/items — add a line item while awaiting approval.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<LineItemRequest>,
) -> Result<(StatusCode, Json<SignalAcceptedResponse>), ApiError> {
    let order_id = OrderId::new(id);
    let item = req.into_line_item()?;
    state
        .signals(&order_id)
        .await?
        .add_line_item(item.sku, item.quantity)?;
    Ok(accepted(&order_id, "add-line-item"))
}

/// GET /orders/{id} — current saga status.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order_id = OrderId::new(id);
    let snapshot = state.snapshot(&order_id).await?;
    Ok(Json(OrderStatusResponse::from_state(&order_id, &snapshot)))
}

/// GET /orders/{id}/items — the order's cart in insertion order.
#[tracing::instrument(skip(state))]
pub async fn items<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LineItem>>, ApiError> {
    let order_id = OrderId::new(id);
    let snapshot = state.snapshot(&order_id).await?;
    Ok(Json(snapshot.items().to_vec()))
}

/// GET /orders/{id}/events — the order's recorded history.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let order_id = OrderId::new(id);
    let envelopes = state.coordinator().history(&order_id).await?;
    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Order {order_id} not found")));
    }

    let responses = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

fn accepted(
    order_id: &OrderId,
    signal: &'static str,
) -> (StatusCode, Json<SignalAcceptedResponse>) {
    metrics::counter!("api_signals_accepted_total", "signal" => signal).increment(1);
    (
        StatusCode::ACCEPTED,
        Json(SignalAcceptedResponse {
            order_id: order_id.to_string(),
            signal,
        }),
    )
}
