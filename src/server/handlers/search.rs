use crate::{error::Result, server::state::AppState, tmdb::models::SearchItem};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

/// Movies and series matching a free-text query
pub async fn search_multi(
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> Result<Json<Arc<Vec<SearchItem>>>> {
    info!("Searching for: {}", params.query);
    Ok(Json(state.search.search_multi(&params.query).await?))
}

/// Productions carrying an IMDb id
pub async fn search_imdb(
    Path(imdb_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Arc<Vec<SearchItem>>>> {
    info!("Looking up IMDb id: {}", imdb_id);
    Ok(Json(state.search.find_by_imdb(&imdb_id).await?))
}
