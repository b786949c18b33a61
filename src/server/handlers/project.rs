use crate::{
    error::Result,
    models::{MediaKind, Production, ProductionCredits},
    server::state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::Value;
use std::sync::Arc;

/// Raw provider details for one production
pub async fn project_details(
    Path((media_type, id)): Path<(String, u64)>,
    State(state): State<AppState>,
) -> Result<Json<Arc<Value>>> {
    let production = Production::new(media_type.parse::<MediaKind>()?, id);
    Ok(Json(state.search.project_details(production).await?))
}

/// Merged cast and crew for one production
pub async fn project_credits(
    Path((media_type, id)): Path<(String, u64)>,
    State(state): State<AppState>,
) -> Result<Json<Arc<ProductionCredits>>> {
    let production = Production::new(media_type.parse::<MediaKind>()?, id);
    Ok(Json(state.credits.fetch_credits(production).await?))
}
