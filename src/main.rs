use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use lanlauncher_server::api::{self, AppState};
use lanlauncher_server::config::Config;
use lanlauncher_server::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    if !config.games_dir.is_dir() {
        tracing::warn!(
            games_dir = %config.games_dir.display(),
            "Games directory does not exist yet; listing will fail until it is created"
        );
    }

    let state = AppState::from_config(&config);
    let app = api::router(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.bind_address, config.content_server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(
        games_dir = %config.games_dir.display(),
        "Content server listening on {addr}"
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
