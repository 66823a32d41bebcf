//! Health and readiness handlers.

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "framex-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe.
pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
