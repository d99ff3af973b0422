// HTTP surface: request classification, catalog listing and file routes.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::catalog::{Catalog, CatalogSource, GameEntry};
use crate::config::Config;
use crate::metrics;
use crate::stream::FileTransfer;

// ── Client-visible messages ───────────────────────────────────────────

pub const INVALID_REQUEST: &str = "Invalid request.";
pub const INVALID_DOWNLOAD: &str = "Invalid download location.";
pub const INVALID_COVER: &str = "Invalid cover location.";
pub const DOWNLOAD_MISSING: &str = "Game download file does not exist!";
pub const COVER_MISSING: &str = "Cover not found";
pub const GAMES_DIR_UNAVAILABLE: &str = "Games directory unavailable.";

// ── Routing ───────────────────────────────────────────────────────────

/// Public paths for the three catalog routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths {
    /// Exact path of the listing.
    pub listing: String,
    /// Prefix followed by a download token.
    pub download_prefix: String,
    /// Prefix followed by a cover token.
    pub cover_prefix: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RoutePaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            listing: config.listing_path.clone(),
            download_prefix: config.download_prefix.clone(),
            cover_prefix: config.cover_prefix.clone(),
        }
    }
}

/// What an inbound request path asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Listing,
    Download(&'a str),
    Cover(&'a str),
    Invalid,
}

impl<'a> Route<'a> {
    /// Classify a URI path. Listing is an exact match, download and cover are
    /// prefix matches carrying the remainder of the path as the token.
    pub fn classify(path: &'a str, routes: &RoutePaths) -> Self {
        if path == routes.listing {
            Route::Listing
        } else if let Some(token) = path.strip_prefix(routes.download_prefix.as_str()) {
            Route::Download(token)
        } else if let Some(token) = path.strip_prefix(routes.cover_prefix.as_str()) {
            Route::Cover(token)
        } else {
            Route::Invalid
        }
    }

    /// Low-cardinality label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Route::Listing => "listing",
            Route::Download(_) => "download",
            Route::Cover(_) => "cover",
            Route::Invalid => "invalid",
        }
    }
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogSource>,
    pub routes: Arc<RoutePaths>,
}

impl AppState {
    pub fn new(catalog: CatalogSource, routes: RoutePaths) -> Self {
        Self {
            catalog: Arc::new(catalog),
            routes: Arc::new(routes),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let source = CatalogSource::new(
            config.games_dir.clone(),
            config.layout(),
            config.catalog_ttl(),
        );
        Self::new(source, RoutePaths::from_config(config))
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .fallback(dispatch)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "lanlauncher-server" }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Record request counts and latency per route kind. Tokens never reach
/// metric labels.
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let route = match req.uri().path() {
        "/health" => "health",
        "/metrics" => "metrics",
        path => Route::classify(path, &state.routes).label(),
    };
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[route])
        .observe(start.elapsed().as_secs_f64());
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), route, response.status().as_str()])
        .inc();
    response
}

/// Catch-all handler: every request not matched by a fixed route lands here.
pub async fn dispatch(State(state): State<AppState>, uri: Uri) -> Response {
    match Route::classify(uri.path(), &state.routes) {
        Route::Listing => send_listing(&state).await,
        Route::Download(token) => send_game_archive(&state, token).await,
        Route::Cover(token) => send_game_cover(&state, token).await,
        Route::Invalid => (StatusCode::OK, INVALID_REQUEST).into_response(),
    }
}

async fn load_catalog(state: &AppState) -> Result<Arc<Catalog>, Response> {
    state.catalog.catalog().await.map_err(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, GAMES_DIR_UNAVAILABLE).into_response()
    })
}

async fn send_listing(state: &AppState) -> Response {
    let catalog = match load_catalog(state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let listing = catalog.to_listing(&state.routes.download_prefix, &state.routes.cover_prefix);
    (StatusCode::OK, Json(listing)).into_response()
}

async fn send_game_archive(state: &AppState, token: &str) -> Response {
    let catalog = match load_catalog(state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(game) = catalog.resolve_by_download_token(token) else {
        metrics::TRANSFERS_TOTAL
            .with_label_values(&["download", "unknown"])
            .inc();
        return (StatusCode::OK, INVALID_DOWNLOAD).into_response();
    };

    let layout = state.catalog.layout();
    let transfer = match open_asset(game, &game.archive_path(layout), "download").await {
        Some(t) => t,
        None => return (StatusCode::OK, DOWNLOAD_MISSING).into_response(),
    };

    tracing::info!(game = %game.folder_name, bytes = transfer.len(), "Sending game archive");
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_LENGTH, transfer.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", layout.archive_file_name),
        ),
    ];
    (StatusCode::OK, headers, transfer.into_body()).into_response()
}

async fn send_game_cover(state: &AppState, token: &str) -> Response {
    let catalog = match load_catalog(state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(game) = catalog.resolve_by_cover_token(token) else {
        metrics::TRANSFERS_TOTAL
            .with_label_values(&["cover", "unknown"])
            .inc();
        return (StatusCode::OK, INVALID_COVER).into_response();
    };

    let layout = state.catalog.layout();
    let transfer = match open_asset(game, &game.cover_path(layout), "cover").await {
        Some(t) => t,
        None => return (StatusCode::NOT_FOUND, COVER_MISSING).into_response(),
    };

    let headers = [
        (header::CONTENT_TYPE, "image/jpeg".to_string()),
        (header::CONTENT_LENGTH, transfer.len().to_string()),
    ];
    (StatusCode::OK, headers, transfer.into_body()).into_response()
}

/// Open a game's asset file. The catalog only vouches for the manifest, so
/// the asset may have vanished or never existed.
async fn open_asset(game: &GameEntry, path: &std::path::Path, kind: &str) -> Option<FileTransfer> {
    match FileTransfer::open(path).await {
        Ok(t) => {
            metrics::TRANSFERS_TOTAL.with_label_values(&[kind, "ok"]).inc();
            Some(t)
        }
        Err(e) => {
            metrics::TRANSFERS_TOTAL
                .with_label_values(&[kind, "missing"])
                .inc();
            tracing::warn!(game = %game.folder_name, path = %path.display(), "Cannot open {kind} file: {e}");
            None
        }
    }
}
