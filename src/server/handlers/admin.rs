use crate::{
    cache::CacheStats,
    error::Result,
    models::{MediaKind, Production},
    server::state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};
use tracing::info;

pub async fn flush_cache(State(state): State<AppState>) -> Json<Value> {
    state.cache.flush_all();
    Json(json!({"success": true, "message": "All caches flushed successfully"}))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Drop cached details, credits and comparisons for one production
pub async fn invalidate(
    Path((media_type, id)): Path<(String, u64)>,
    State(state): State<AppState>,
) -> Result<Json<Value>> {
    let production = Production::new(media_type.parse::<MediaKind>()?, id);
    let removed = state.cache.invalidate_production(&production);
    info!("Admin invalidation of {} removed {} entries", production, removed);
    Ok(Json(json!({"success": true, "removed": removed})))
}
