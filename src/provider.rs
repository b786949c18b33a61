use crate::error::Result;
use crate::models::Production;
use crate::tmdb::models::{
    CreditsResponse, ExternalIds, FindResponse, SearchPage, SeasonDetails, SeriesDetails,
};
use async_trait::async_trait;
use serde_json::Value;

/// Upstream metadata endpoints the credit pipeline consumes.
///
/// [`crate::tmdb::TmdbClient`] talks to TMDB; tests substitute an
/// in-memory implementation.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `GET /{kind}/{id}`; raw provider JSON
    async fn details(&self, production: Production) -> Result<Value>;

    /// `GET /{kind}/{id}/credits`
    async fn credits(&self, production: Production) -> Result<CreditsResponse>;

    /// `GET /{kind}/{id}/credits` for a TV record other than the one being
    /// compared (a duplicate of the same real-world series)
    async fn series_credits(&self, series_id: u64) -> Result<CreditsResponse> {
        self.credits(Production::tv(series_id)).await
    }

    /// `GET /tv/{id}` with aggregate credits, detailed credits and external
    /// ids appended
    async fn series_details(&self, series_id: u64) -> Result<SeriesDetails>;

    /// `GET /tv/{id}/season/{n}`
    async fn season_details(&self, series_id: u64, season: u32) -> Result<SeasonDetails>;

    /// `GET /tv/{id}/season/{n}/credits`
    async fn season_credits(&self, series_id: u64, season: u32) -> Result<CreditsResponse>;

    /// `GET /tv/{id}/season/{n}/episode/{m}/credits`
    async fn episode_credits(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> Result<CreditsResponse>;

    /// `GET /find/{imdb_id}?external_source=imdb_id`
    async fn find_by_imdb_id(&self, imdb_id: &str) -> Result<FindResponse>;

    /// `GET /person/{id}/external_ids`
    async fn person_external_ids(&self, person_id: u64) -> Result<ExternalIds>;

    /// `GET /search/multi`, one page
    async fn search_multi(&self, query: &str, page: u32) -> Result<SearchPage>;
}
