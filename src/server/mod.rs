pub mod handlers;
pub mod state;

use crate::config::Config;
use crate::error::Result;
use crate::metrics;
use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use handlers::{admin, compare, health, project, search};
use state::AppState;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const VERSION_HEADER: HeaderName = HeaderName::from_static("x-castmatch-version");

/// Build the application router around a fully wired state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(handlers::metrics::serve_metrics))
        .route("/api/search/multi", get(search::search_multi))
        .route("/api/search/imdb/{imdb_id}", get(search::search_imdb))
        .route(
            "/api/project/{media_type}/{id}",
            get(project::project_details),
        )
        .route(
            "/api/project/{media_type}/{id}/credits",
            get(project::project_credits),
        )
        .route("/api/compare", post(compare::compare))
        .route("/api/admin/flush-cache", get(admin::flush_cache))
        .route("/api/admin/cache-stats", get(admin::cache_stats))
        .route(
            "/api/admin/invalidate/{media_type}/{id}",
            post(admin::invalidate),
        )
        .layer(middleware::from_fn(track_requests))
        .layer(cors_layer())
        .with_state(state)
}

/// Build the router for `config`, talking to the configured TMDB endpoint
pub async fn build_router(config: Config) -> Result<Router> {
    Ok(router(AppState::new(config)?))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([VERSION_HEADER])
}

/// Stamp the version header and record request metrics
async fn track_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let mut response = next.run(req).await;

    response.headers_mut().insert(
        VERSION_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    metrics::record_request(&endpoint, response.status().as_u16());
    metrics::record_duration(&endpoint, start);

    response
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    // Create shared application state
    let state = AppState::new(config)?;
    state.cache.spawn_sweeper();

    let app = router(state.clone());

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            state.cache.shutdown().await;
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.cache.shutdown().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server stopped");
    Ok(())
}
