//! HTTP API for the order fulfillment saga.
//!
//! Starts sagas, forwards approval, cancellation and cart signals to them
//! and exposes their status and history, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    InMemoryCustomerService, InMemoryInventoryService, InMemoryNotificationService,
    InMemoryOrderStatusService, InMemoryPaymentService, SagaCoordinator, SagaOptions, SagaServices,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/orders", post(routes::orders::start::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/approve", post(routes::orders::approve::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/items",
            get(routes::orders::items::<S>).post(routes::orders::add_item::<S>),
        )
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state backed by the in-memory external services.
pub fn create_default_state<S: EventStore + 'static>(
    event_store: Arc<S>,
    options: SagaOptions,
) -> Arc<AppState<S>> {
    let services = SagaServices::new(
        InMemoryInventoryService::new(),
        InMemoryCustomerService::new(),
        InMemoryPaymentService::new(),
        InMemoryOrderStatusService::new(),
        InMemoryNotificationService::new(),
    );
    let coordinator = SagaCoordinator::new(event_store, services).with_options(options);
    Arc::new(AppState::new(coordinator))
}
