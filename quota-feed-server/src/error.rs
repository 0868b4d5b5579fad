use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quota_feed::{FeedError, UnknownTimeframe};
use serde_json::json;
use thiserror::Error;

/// Unified error type for HTTP API responses.
///
/// Upstream failures never reach clients: they see stale data or the loading placeholder.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("feed unavailable: {0}")]
    Unavailable(#[from] FeedError),
}

impl From<UnknownTimeframe> for ServerError {
    fn from(error: UnknownTimeframe) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
