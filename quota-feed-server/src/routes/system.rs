use axum::{Json, Router, extract::State, routing::get};
use quota_feed::FeedStatus;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::state::AppState;

/// Build system sub-router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(status))
        .route("/health", get(health))
}

/// GET /api/status: Quota usage, subscribers and cache freshness.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<FeedStatus> {
    Json(state.feed.status())
}

/// GET /health: Liveness only, independent of upstream health.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
