//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::routes::orders::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{OrderId, OrderState};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::SagaOptions;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<AppState<InMemoryEventStore>>) {
    setup_with_options(SagaOptions::default())
}

fn setup_with_options(options: SagaOptions) -> (axum::Router, Arc<AppState<InMemoryEventStore>>) {
    let store = Arc::new(InMemoryEventStore::new());
    let state = api::create_default_state(store, options);
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn start_order(app: &axum::Router, order_id: &str) {
    let (status, body) = send(
        app,
        "POST",
        "/orders",
        Some(json!({
            "order_id": order_id,
            "items": [{ "sku": "WIDGET-1", "quantity": 2 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
}

async fn wait_until_terminal(state: &AppState<InMemoryEventStore>, order_id: &str) -> OrderState {
    let projector = state
        .status(&OrderId::new(order_id))
        .await
        .expect("saga should be tracked");
    tokio::time::timeout(
        Duration::from_secs(5),
        projector.wait_for(|s| s.is_terminal()),
    )
    .await
    .expect("saga did not finish in time")
}

async fn wait_until_idle(state: &AppState<InMemoryEventStore>) {
    for _ in 0..500 {
        if state.saga_counts().await.1 == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sagas still running");
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["sagas"], 0);
}

#[tokio::test]
async fn test_start_order() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({ "items": [{ "sku": "WIDGET-1", "quantity": 1 }] })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(!json["order_id"].as_str().unwrap().is_empty());
    assert!(json["stage"].is_string());
}

#[tokio::test]
async fn test_approve_completes_order() {
    let (app, state) = setup();
    start_order(&app, "order-approve").await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders/order-approve/approve",
        Some(json!({ "approved_by": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["signal"], "approve-payment");

    let final_state = wait_until_terminal(&state, "order-approve").await;
    assert!(final_state.charged());

    let (status, json) = send(&app, "GET", "/orders/order-approve", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stage"], "completed");
    assert_eq!(json["approved_by"], "alice");
    assert_eq!(json["charged"], true);
    assert_eq!(json["version_tag"], "v2");
}

#[tokio::test]
async fn test_cancel_compensates_order() {
    let (app, state) = setup();
    start_order(&app, "order-cancel").await;

    let (status, _) = send(
        &app,
        "POST",
        "/orders/order-cancel/cancel",
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let final_state = wait_until_terminal(&state, "order-cancel").await;
    assert!(final_state.cancelled());
    assert!(!final_state.charged());

    let (_, json) = send(&app, "GET", "/orders/order-cancel", None).await;
    assert_eq!(json["stage"], "cancelled");
    assert_eq!(json["cancellation_reason"], "changed my mind");
    assert_eq!(json["compensated"], json!(["release_stock"]));
}

#[tokio::test]
async fn test_approval_timeout_cancels_order() {
    let options = SagaOptions::default().with_approval_window(Duration::from_millis(50));
    let (app, state) = setup_with_options(options);
    start_order(&app, "order-timeout").await;

    let final_state = wait_until_terminal(&state, "order-timeout").await;
    assert!(final_state.cancelled());

    let (_, json) = send(&app, "GET", "/orders/order-timeout", None).await;
    assert_eq!(json["stage"], "cancelled");
}

#[tokio::test]
async fn test_add_item_before_approval() {
    let (app, state) = setup();
    start_order(&app, "order-items").await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders/order-items/items",
        Some(json!({ "sku": "GADGET-9", "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["signal"], "add-line-item");

    send(
        &app,
        "POST",
        "/orders/order-items/approve",
        Some(json!({ "approved_by": "bob" })),
    )
    .await;
    wait_until_terminal(&state, "order-items").await;

    let (status, json) = send(&app, "GET", "/orders/order-items/items", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["sku"], "WIDGET-1");
    assert_eq!(items[1]["sku"], "GADGET-9");
    assert_eq!(items[1]["quantity"], 3);
}

#[tokio::test]
async fn test_add_item_with_zero_quantity_rejected() {
    let (app, _) = setup();
    start_order(&app, "order-bad-item").await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders/order-bad-item/items",
        Some(json!({ "sku": "GADGET-9", "quantity": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("quantity"));
}

#[tokio::test]
async fn test_duplicate_start_conflicts() {
    let (app, _) = setup();
    start_order(&app, "order-dup").await;

    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({ "order_id": "order-dup", "items": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_start_with_invalid_quantity() {
    let (app, state) = setup();

    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "order_id": "order-invalid",
            "items": [{ "sku": "WIDGET-1", "quantity": 0 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(state.saga_counts().await.0, 0);
}

#[tokio::test]
async fn test_unknown_order_not_found() {
    let (app, _) = setup();

    let (status, _) = send(&app, "GET", "/orders/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/orders/nope/events", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/orders/nope/approve",
        Some(json!({ "approved_by": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signal_after_finish_conflicts() {
    let (app, state) = setup();
    start_order(&app, "order-closed").await;
    send(
        &app,
        "POST",
        "/orders/order-closed/approve",
        Some(json!({ "approved_by": "alice" })),
    )
    .await;
    wait_until_terminal(&state, "order-closed").await;
    wait_until_idle(&state).await;

    let (status, _) = send(
        &app,
        "POST",
        "/orders/order-closed/cancel",
        Some(json!({ "reason": "too late" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_order_events() {
    let (app, state) = setup();
    start_order(&app, "order-events").await;
    send(
        &app,
        "POST",
        "/orders/order-events/approve",
        Some(json!({ "approved_by": "alice" })),
    )
    .await;
    wait_until_terminal(&state, "order-events").await;

    let (status, json) = send(&app, "GET", "/orders/order-events/events", None).await;

    assert_eq!(status, StatusCode::OK);
    let events = json.as_array().unwrap();
    assert_eq!(events[0]["event_type"], "SagaStarted");
    assert_eq!(events[0]["version"], 1);
    assert_eq!(events.last().unwrap()["event_type"], "SagaCompleted");
    for pair in events.windows(2) {
        assert!(pair[0]["version"].as_i64() < pair[1]["version"].as_i64());
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_finished_saga_handle_is_dropped_and_still_readable() {
    let (app, state) = setup();
    start_order(&app, "order-done").await;
    send(
        &app,
        "POST",
        "/orders/order-done/approve",
        Some(json!({ "approved_by": "alice" })),
    )
    .await;
    wait_until_terminal(&state, "order-done").await;
    wait_until_idle(&state).await;
    assert_eq!(state.saga_counts().await.0, 1);

    let (status, json) = send(&app, "GET", "/orders/order-done", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stage"], "completed");
    assert_eq!(json["charged"], true);
    assert_eq!(state.saga_counts().await.0, 0);
    assert!(state.status(&OrderId::new("order-done")).await.is_none());

    let (status, json) = send(&app, "GET", "/orders/order-done/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_start_drops_finished_handles() {
    let (app, state) = setup();
    start_order(&app, "order-first").await;
    send(
        &app,
        "POST",
        "/orders/order-first/cancel",
        Some(json!({ "reason": "not needed" })),
    )
    .await;
    wait_until_terminal(&state, "order-first").await;
    wait_until_idle(&state).await;

    start_order(&app, "order-second").await;

    let (tracked, _) = state.saga_counts().await;
    assert_eq!(tracked, 1);
    assert!(state.status(&OrderId::new("order-first")).await.is_none());
    assert!(state.status(&OrderId::new("order-second")).await.is_some());

    let (_, json) = send(&app, "GET", "/orders/order-first", None).await;
    assert_eq!(json["stage"], "cancelled");
}
