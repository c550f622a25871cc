//! Service health.

use axum::{extract::State, Json};
use serde_json::json;

use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version,
    }))
}
