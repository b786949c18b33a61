use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// Liveness plus a snapshot of the cache tiers
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": if state.config.is_dev { "development" } else { "production" },
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "cache": state.cache.stats(),
    }))
}
