use quota_feed::Feed;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
#[derive(Debug)]
pub struct AppState {
    pub feed: Feed,
    /// Flips to `true` once the server starts shutting down, ending open push streams.
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(feed: Feed) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self { feed, shutdown })
    }

    /// Resolves once [`AppState::begin_shutdown`] has been called.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut shutdown = self.shutdown.subscribe();
        async move {
            // Err once the state is dropped, which ends the stream as well
            let _ = shutdown.wait_for(|stopping| *stopping).await;
        }
    }

    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
