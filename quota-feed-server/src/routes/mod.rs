pub mod market;
pub mod stream;
pub mod system;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Assemble the API router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(market::routes())
        .merge(stream::routes())
        .merge(system::routes())
}
