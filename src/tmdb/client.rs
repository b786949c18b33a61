use crate::config::Config;
use crate::error::{CastmatchError, Result};
use crate::http_retry::{Pacer, RetryConfig, send_with_rate_limit_retry};
use crate::metrics;
use crate::models::Production;
use crate::provider::MetadataProvider;
use crate::tmdb::models::{
    ApiErrorBody, CreditsResponse, ExternalIds, FindResponse, SearchPage, SeasonDetails,
    SeriesDetails,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// TMDB v3 client.
///
/// Every request carries the API key and language, goes through the shared
/// [`Pacer`] and is transparently re-sent when TMDB answers 429.
pub struct TmdbClient {
    http: Client,
    base_url: String,
    api_key: String,
    language: String,
    pacer: Pacer,
    retry: RetryConfig,
}

impl TmdbClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            language: "en-US".to_string(),
            pacer: Pacer::new(Duration::from_millis(100)),
            retry: RetryConfig::default(),
        }
    }

    /// Client configured from the application config.
    pub fn from_config(http: Client, config: &Config) -> Self {
        Self::new(http, &config.tmdb_base_url, &config.tmdb_api_key)
            .with_language(&config.tmdb_language)
            .with_request_delay(Duration::from_millis(config.tmdb_request_delay_ms))
            .with_retry_config(RetryConfig {
                max_rate_limit_retries: config.tmdb_max_rate_limit_retries,
                timeout: Some(Duration::from_secs(config.tmdb_timeout_secs)),
                ..Default::default()
            })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.pacer = Pacer::new(delay);
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!("TMDB GET {}", path);

        let request = self
            .http
            .get(self.url(path))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", self.language.as_str()),
            ])
            .query(query);

        let response = send_with_rate_limit_retry(request, &self.pacer, &self.retry).await?;
        let status = response.status();
        metrics::record_upstream(status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.status_message)
                .unwrap_or(body);
            warn!("TMDB API error {} for {}: {}", status, path, message);
            return Err(status_error(status, path, &message));
        }

        response
            .json()
            .await
            .map_err(|e| CastmatchError::Upstream(format!("Invalid TMDB response for {path}: {e}")))
    }
}

/// Translate a non-success, non-429 status into the error taxonomy.
fn status_error(status: StatusCode, path: &str, message: &str) -> CastmatchError {
    match status {
        StatusCode::BAD_REQUEST => {
            CastmatchError::BadRequest(format!("Invalid request to TMDB API: {message}"))
        }
        StatusCode::UNAUTHORIZED => {
            CastmatchError::Unauthorized(format!("Invalid TMDB API key: {message}"))
        }
        StatusCode::NOT_FOUND => {
            CastmatchError::NotFound(format!("Resource not found on TMDB API: {path}"))
        }
        _ => CastmatchError::Upstream(format!("TMDB API error {status}: {message}")),
    }
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn details(&self, production: Production) -> Result<Value> {
        self.get_json(
            &format!("/{}/{}", production.media_type, production.id),
            &[],
        )
        .await
    }

    async fn credits(&self, production: Production) -> Result<CreditsResponse> {
        self.get_json(
            &format!("/{}/{}/credits", production.media_type, production.id),
            &[],
        )
        .await
    }

    async fn series_details(&self, series_id: u64) -> Result<SeriesDetails> {
        self.get_json(
            &format!("/tv/{series_id}"),
            &[("append_to_response", "aggregate_credits,credits,external_ids")],
        )
        .await
    }

    async fn season_details(&self, series_id: u64, season: u32) -> Result<SeasonDetails> {
        self.get_json(&format!("/tv/{series_id}/season/{season}"), &[])
            .await
    }

    async fn season_credits(&self, series_id: u64, season: u32) -> Result<CreditsResponse> {
        self.get_json(&format!("/tv/{series_id}/season/{season}/credits"), &[])
            .await
    }

    async fn episode_credits(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> Result<CreditsResponse> {
        self.get_json(
            &format!("/tv/{series_id}/season/{season}/episode/{episode}/credits"),
            &[],
        )
        .await
    }

    async fn find_by_imdb_id(&self, imdb_id: &str) -> Result<FindResponse> {
        self.get_json(
            &format!("/find/{imdb_id}"),
            &[("external_source", "imdb_id")],
        )
        .await
    }

    async fn person_external_ids(&self, person_id: u64) -> Result<ExternalIds> {
        self.get_json(&format!("/person/{person_id}/external_ids"), &[])
            .await
    }

    async fn search_multi(&self, query: &str, page: u32) -> Result<SearchPage> {
        let page = page.to_string();
        self.get_json(
            "/search/multi",
            &[
                ("query", query),
                ("include_adult", "false"),
                ("page", page.as_str()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TmdbClient {
        TmdbClient::new(Client::new(), server.uri(), "test-key").with_request_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn attaches_credential_and_language() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/603/credits"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("language", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cast": [{"id": 6384, "name": "Keanu Reeves", "character": "Neo", "order": 0}],
                "crew": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credits = client(&server)
            .credits(Production::movie(603))
            .await
            .unwrap();
        assert_eq!(credits.cast[0].name, "Keanu Reeves");
    }

    #[tokio::test]
    async fn series_details_appends_related_data() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tv/1396"))
            .and(query_param(
                "append_to_response",
                "aggregate_credits,credits,external_ids",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1396,
                "number_of_seasons": 5,
                "external_ids": {"imdb_id": "tt0903747"}
            })))
            .mount(&server)
            .await;

        let details = client(&server).series_details(1396).await.unwrap();
        assert_eq!(details.number_of_seasons, 5);
        assert!(details.aggregate_credits.is_none());
        assert_eq!(
            details.external_ids.unwrap().imdb(),
            Some("tt0903747")
        );
    }

    #[tokio::test]
    async fn maps_client_errors_to_typed_failures() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/1"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/2"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "status_code": 7,
                "status_message": "Invalid API key: You must be granted a valid key."
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/movie/4"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client(&server);
        let kind = |r: Result<Value>| r.unwrap_err().kind();

        assert_eq!(kind(client.details(Production::movie(1)).await), ErrorKind::BadRequest);
        let unauthorized = client.details(Production::movie(2)).await.unwrap_err();
        assert_eq!(unauthorized.kind(), ErrorKind::Unauthorized);
        assert!(unauthorized.to_string().contains("Invalid API key"));
        assert_eq!(kind(client.details(Production::movie(3)).await), ErrorKind::NotFound);
        assert_eq!(kind(client.details(Production::movie(4)).await), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).person_external_ids(31).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn rate_limit_is_invisible_to_callers() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/person/31/external_ids"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/person/31/external_ids"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"imdb_id": "nm0000158"})),
            )
            .mount(&server)
            .await;

        let ids = client(&server).person_external_ids(31).await.unwrap();
        assert_eq!(ids.imdb(), Some("nm0000158"));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_json_is_an_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = client(&server).credits(Production::tv(1)).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn search_sends_query_and_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .and(query_param("query", "matrix"))
            .and(query_param("page", "2"))
            .and(query_param("include_adult", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 2,
                "results": [{"id": 603, "media_type": "movie", "title": "The Matrix"}],
                "total_pages": 3,
                "total_results": 41
            })))
            .mount(&server)
            .await;

        let page = client(&server).search_multi("matrix", 2).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.results[0].id, 603);
    }
}
