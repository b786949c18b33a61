use crate::{
    error::Result,
    models::{ComparisonResult, Production},
    server::state::AppState,
};
use axum::{Json, extract::State};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    #[serde(default)]
    pub projects: Vec<Production>,
}

/// Everyone credited across the requested productions
pub async fn compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<Arc<ComparisonResult>>> {
    info!("Comparison requested for {} projects", request.projects.len());
    Ok(Json(state.comparisons.compare(&request.projects).await?))
}
