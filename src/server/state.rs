use crate::cache::TieredCache;
use crate::compare::ComparisonEngine;
use crate::config::Config;
use crate::credits::CreditFetcher;
use crate::enrich::IdentityEnricher;
use crate::error::Result;
use crate::metrics;
use crate::provider::MetadataProvider;
use crate::search::SearchService;
use crate::tmdb::TmdbClient;
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Process-wide cache shared by every service below
    pub cache: TieredCache,
    pub credits: Arc<CreditFetcher>,
    pub comparisons: Arc<ComparisonEngine>,
    pub search: Arc<SearchService>,
    /// Prometheus handle for `/metrics`, if a recorder could be installed
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState talking to TMDB as configured
    pub fn new(config: Config) -> Result<Self> {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        let tmdb = TmdbClient::from_config(http_client, &config);
        Ok(Self::with_provider(config, Arc::new(tmdb)))
    }

    /// Wire every service around `provider`
    pub fn with_provider(config: Config, provider: Arc<dyn MetadataProvider>) -> Self {
        let cache = TieredCache::new(config.cache_config());

        let credits = Arc::new(
            CreditFetcher::new(provider.clone(), cache.clone())
                .with_episode_limit(config.episode_credits_limit),
        );
        let enricher = Arc::new(
            IdentityEnricher::new(provider.clone(), cache.clone()).with_batching(
                config.enrich_batch_size,
                Duration::from_millis(config.enrich_batch_delay_ms),
            ),
        );
        let comparisons = Arc::new(ComparisonEngine::new(
            credits.clone(),
            enricher,
            cache.clone(),
        ));
        let search = Arc::new(
            SearchService::new(provider, cache.clone()).with_max_pages(config.search_max_pages),
        );

        Self {
            config: Arc::new(config),
            cache,
            credits,
            comparisons,
            search,
            metrics: metrics::install_recorder(),
            started_at: Instant::now(),
        }
    }
}
