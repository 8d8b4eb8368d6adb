use axum::{routing::get, Extension, Json, Router};
use serde_json::{json, Value};

use crate::state::SharedRegistry;

pub mod upload;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(upload::router())
        .merge(ws::router())
}

async fn health(Extension(registry): Extension<SharedRegistry>) -> Json<Value> {
    Json(json!({ "status": "ok", "rooms": registry.len().await }))
}
