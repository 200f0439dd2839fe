pub mod admin;
pub mod auth;
pub mod chat;
pub mod courses;
pub mod engagement;
pub mod events;
pub mod forms;
pub mod progress;
pub mod realtime;

use axum::Json;
use serde_json::{Value, json};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "nexus",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
