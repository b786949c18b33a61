//! Wire shapes of the TMDB v3 responses the service consumes.
//!
//! Only the fields we read are modelled; everything is defaulted because
//! the provider omits or nulls fields freely across endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `/credits`, `/aggregate_credits`, season and episode credits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreditsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cast: Vec<RawCast>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub crew: Vec<RawCrew>,
    /// Only present on season/episode credits
    #[serde(default, deserialize_with = "null_as_default")]
    pub guest_stars: Vec<RawCast>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCast {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
    /// Aggregate credits list one role per character played
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<RawRole>,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRole {
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub episode_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCrew {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
    /// Aggregate credits list one entry per job held
    #[serde(default, deserialize_with = "null_as_default")]
    pub jobs: Vec<RawJob>,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawJob {
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub episode_count: Option<u32>,
}

/// `/tv/{id}?append_to_response=aggregate_credits,credits,external_ids`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesDetails {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub number_of_seasons: u32,
    #[serde(default)]
    pub credits: Option<CreditsResponse>,
    #[serde(default)]
    pub aggregate_credits: Option<CreditsResponse>,
    #[serde(default)]
    pub external_ids: Option<ExternalIds>,
}

/// `/person/{id}/external_ids` and the appended `external_ids` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub imdb_id: Option<String>,
}

impl ExternalIds {
    /// The IMDb id, if present and non-empty.
    pub fn imdb(&self) -> Option<&str> {
        self.imdb_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// `/tv/{id}/season/{n}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeasonDetails {
    #[serde(default, deserialize_with = "null_as_default")]
    pub episodes: Vec<EpisodeSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_number: u32,
}

/// A search or find result. Fields we don't interpret are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchItem {
    pub fn is_production(&self) -> bool {
        matches!(self.media_type.as_deref(), Some("movie") | Some("tv"))
    }
}

/// `/find/{external_id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub movie_results: Vec<SearchItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tv_results: Vec<SearchItem>,
}

/// One page of `/search/multi`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<SearchItem>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_pages: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_results: u64,
}

/// Body TMDB returns alongside error statuses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
