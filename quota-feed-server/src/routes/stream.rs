use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::{Stream, StreamExt};
use quota_feed::PushMessage;
use std::{convert::Infallible, sync::Arc};
use tracing::warn;

use crate::state::AppState;

/// Build push stream sub-router.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stream", get(stream))
}

/// GET /api/stream: Server-Sent Events: bootstrap snapshot, then live updates.
///
/// The subscription is released as soon as the client disconnects and the response is dropped.
pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .feed
        .subscribe()
        .map(|message| Ok(sse_event(message)))
        .take_until(state.shutdown_signal());

    Sse::new(events)
}

/// Encode one [`PushMessage`]: events as a JSON `data:` line, keep-alives as a comment.
pub fn sse_event(message: PushMessage) -> Event {
    match message {
        PushMessage::Event(event) => Event::default().json_data(&event).unwrap_or_else(|error| {
            warn!(%error, kind = event.kind(), "failed to encode feed event");
            Event::default().comment("encode-error")
        }),
        PushMessage::KeepAlive => Event::default().comment("keep-alive"),
    }
}
