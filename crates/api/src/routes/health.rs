//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use serde::Serialize;

use super::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Sagas started or resumed by this server.
    pub sagas: usize,
    pub running: usize,
}

/// GET /health — returns system health status.
pub async fn check<S: EventStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let (sagas, running) = state.saga_counts().await;
    Json(HealthResponse {
        status: "ok",
        sagas,
        running,
    })
}
