//! Health check endpoints.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::{Value, json};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Ready once the local region has a known intensity.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.telemetry.latest_local().await {
        Some(intensity) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "intensity": intensity })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "waiting for telemetry" })),
        ),
    }
}
