use crate::cache::{CacheConfig, TierPolicy};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub is_dev: bool,
    /// TMDB v3 API key, sent as the `api_key` query parameter
    pub tmdb_api_key: String,
    /// TMDB API base URL (default: https://api.themoviedb.org/3)
    pub tmdb_base_url: String,
    /// Language requested from TMDB (default: en-US)
    pub tmdb_language: String,
    /// Minimum spacing between outbound TMDB requests in milliseconds (default: 100)
    pub tmdb_request_delay_ms: u64,
    /// Per-request timeout in seconds (default: 10)
    pub tmdb_timeout_secs: u64,
    /// How many 429s in a row we absorb before giving up (default: 5)
    pub tmdb_max_rate_limit_retries: u32,
    /// Metadata tier TTL in seconds (default: 86400)
    pub project_cache_ttl_secs: u64,
    /// Comparison tier TTL in seconds (default: 43200)
    pub comparison_cache_ttl_secs: u64,
    /// Search tier TTL in seconds (default: 3600)
    pub search_cache_ttl_secs: u64,
    /// Person external id TTL in seconds (default: 604800)
    pub external_id_cache_ttl_secs: u64,
    /// People resolved concurrently per enrichment batch (default: 10)
    pub enrich_batch_size: usize,
    /// Pause between enrichment batches in milliseconds (default: 100)
    pub enrich_batch_delay_ms: u64,
    /// Episodes per season inspected for extra crew (default: 5)
    pub episode_credits_limit: usize,
    /// Maximum search result pages fetched per query (default: 10)
    pub search_max_pages: u32,
}

/// Parse an optional env var, falling back to `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and TMDB_API_KEY are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // API key: required in prod, may be empty in dev (upstream calls will 401)
        let tmdb_api_key = if is_dev {
            env::var("TMDB_API_KEY").unwrap_or_default()
        } else {
            env::var("TMDB_API_KEY").map_err(|_| "TMDB_API_KEY is required in production")?
        };

        let tmdb_base_url = env::var("TMDB_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.themoviedb.org/3".to_string());
        Url::parse(&tmdb_base_url)
            .map_err(|e| format!("TMDB_API_BASE_URL is not a valid URL: {e}"))?;
        let tmdb_base_url = tmdb_base_url.trim_end_matches('/').to_string();

        let tmdb_language = env::var("TMDB_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());

        Ok(Config {
            port,
            is_dev,
            tmdb_api_key,
            tmdb_base_url,
            tmdb_language,
            tmdb_request_delay_ms: env_or("TMDB_REQUEST_DELAY_MS", 100),
            tmdb_timeout_secs: env_or("TMDB_TIMEOUT_SECS", 10),
            tmdb_max_rate_limit_retries: env_or("TMDB_MAX_RATE_LIMIT_RETRIES", 5),
            project_cache_ttl_secs: env_or("PROJECT_CACHE_TTL", 86_400),
            comparison_cache_ttl_secs: env_or("COMPARISON_CACHE_TTL", 43_200),
            search_cache_ttl_secs: env_or("SEARCH_CACHE_TTL", 3_600),
            external_id_cache_ttl_secs: env_or("EXTERNAL_ID_CACHE_TTL", 604_800),
            enrich_batch_size: env_or("ENRICH_BATCH_SIZE", 10usize).max(1),
            enrich_batch_delay_ms: env_or("ENRICH_BATCH_DELAY_MS", 100),
            episode_credits_limit: env_or("EPISODE_CREDITS_LIMIT", 5),
            search_max_pages: env_or("SEARCH_MAX_PAGES", 10u32).max(1),
        })
    }

    /// Cache tier policies derived from the configured TTLs.
    ///
    /// Sweep cadences and the daily search flush are fixed.
    pub fn cache_config(&self) -> CacheConfig {
        let defaults = CacheConfig::default();
        CacheConfig {
            metadata: TierPolicy {
                default_ttl: Duration::from_secs(self.project_cache_ttl_secs),
                ..defaults.metadata
            },
            comparison: TierPolicy {
                default_ttl: Duration::from_secs(self.comparison_cache_ttl_secs),
                ..defaults.comparison
            },
            search: TierPolicy {
                default_ttl: Duration::from_secs(self.search_cache_ttl_secs),
                ..defaults.search
            },
            external_id_ttl: Duration::from_secs(self.external_id_cache_ttl_secs),
            ..defaults
        }
    }
}
