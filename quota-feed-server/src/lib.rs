//! Quota Feed Server - HTTP and Server-Sent Events front end
//!
//! Serves the cached snapshot of a [`quota_feed::Feed`] over REST and pushes every update to
//! connected clients over SSE. All upstream traffic is owned by the feed's poll scheduler, so
//! the number of clients never affects upstream quota consumption.

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use state::AppState;

/// Assemble the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::api_router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
