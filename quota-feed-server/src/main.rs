use quota_feed::Feed;
use quota_feed_server::{config::ServerConfig, logging::init_logging, router, state::AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("quota-feed-server: invalid configuration: {error}");
            std::process::exit(1);
        }
    };

    init_logging(config.log_format);
    info!(?config, "Starting quota-feed server");

    let (feed, scheduler) = match Feed::init(config.feed_config()) {
        Ok(feed) => feed,
        Err(error) => {
            error!(%error, "failed to initialise upstream client");
            std::process::exit(1);
        }
    };
    let scheduler = tokio::spawn(scheduler.run());

    let state = AppState::new(feed);
    let app = router(Arc::clone(&state));

    let listener = TcpListener::bind((config.bind_host.as_str(), config.port))
        .await
        .expect("Failed to bind HTTP server");

    match listener.local_addr() {
        Ok(addr) => info!("Quota feed listening on http://{addr}"),
        Err(error) => error!(%error, "failed to read bound address"),
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await
        .expect("HTTP server failed");

    // Releasing the last feed handle stops the poll scheduler
    drop(state);
    if let Err(error) = scheduler.await {
        error!(%error, "poll scheduler task failed");
    }

    info!("Quota feed server stopped");
}

async fn shutdown_signal(state: Arc<AppState>) {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("Shutdown signal received, closing push streams");
    state.begin_shutdown();
}
