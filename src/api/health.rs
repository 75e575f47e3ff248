//! Health endpoints

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /live
pub async fn live_check() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}

/// GET /ready
pub async fn ready_check() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
