//! Complete cast and crew for one production.
//!
//! Movies take the provider's credit list as-is. Series start from it and
//! are enriched best-effort: detailed and aggregate credits, a season and
//! episode walk when aggregate data is missing, and crew from a duplicate
//! record resolved through the series' IMDb id. A failed enrichment step is
//! logged and skipped; only a failed base fetch fails the call.

pub mod merge;

use crate::cache::TieredCache;
use crate::error::Result;
use crate::metrics;
use crate::models::{Production, ProductionCredits};
use crate::provider::MetadataProvider;
use crate::tmdb::models::RawCast;
use futures_util::future::join_all;
use merge::{CastList, CrewEntry, CrewList};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Episodes read per season when aggregate credits are unavailable.
pub const DEFAULT_EPISODE_CREDITS_LIMIT: usize = 5;

/// Cache key for a production's merged credits.
pub fn cache_key(production: Production) -> String {
    format!("credits_{}", production.composite_id())
}

/// What one season contributes when walked manually.
#[derive(Default)]
struct SeasonHaul {
    cast: Vec<RawCast>,
    crew: Vec<CrewEntry>,
}

pub struct CreditFetcher {
    provider: Arc<dyn MetadataProvider>,
    cache: TieredCache,
    episode_limit: usize,
}

impl CreditFetcher {
    pub fn new(provider: Arc<dyn MetadataProvider>, cache: TieredCache) -> Self {
        Self {
            provider,
            cache,
            episode_limit: DEFAULT_EPISODE_CREDITS_LIMIT,
        }
    }

    pub fn with_episode_limit(mut self, limit: usize) -> Self {
        self.episode_limit = limit;
        self
    }

    /// Merged credits for `production`, from cache when available.
    ///
    /// Fails only when the base credit list cannot be fetched.
    pub async fn fetch_credits(&self, production: Production) -> Result<Arc<ProductionCredits>> {
        let key = cache_key(production);
        if let Some(cached) = self.cache.get::<ProductionCredits>(&key) {
            return Ok(cached);
        }

        let base = self.provider.credits(production).await?;
        let mut cast = CastList::from_base(&base.cast);
        let mut crew = CrewList::from_raw(&base.crew);
        debug!(
            "Base credits for {}: {} cast, {} crew",
            production,
            cast.len(),
            crew.len()
        );

        if production.is_series() {
            self.enrich_series(production.id, &mut cast, &mut crew).await;
        }

        let credits = Arc::new(merge::tag(production, cast, crew));
        info!(
            "Credits for {}: {} cast, {} crew",
            production,
            credits.cast.len(),
            credits.crew.len()
        );
        self.cache.set(&key, Arc::clone(&credits));
        Ok(credits)
    }

    async fn enrich_series(&self, series_id: u64, cast: &mut CastList, crew: &mut CrewList) {
        let details = match self.provider.series_details(series_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(
                    "Series details for tv {} unavailable, keeping base credits: {}",
                    series_id, e
                );
                metrics::record_enrichment_skipped("series_details");
                return;
            }
        };

        if let Some(detailed) = &details.credits {
            for member in &detailed.cast {
                cast.merge(member);
            }
            crew.extend_raw(&detailed.crew);
        }

        match &details.aggregate_credits {
            Some(aggregate) => {
                for member in &aggregate.cast {
                    cast.merge(member);
                }
                let added = crew.extend_raw(&aggregate.crew);
                debug!("Aggregate credits added {} crew for tv {}", added, series_id);
            }
            None => {
                self.walk_seasons(series_id, details.number_of_seasons, cast, crew)
                    .await
            }
        }

        if let Some(imdb_id) = details.external_ids.as_ref().and_then(|ids| ids.imdb()) {
            self.union_duplicate_record(series_id, imdb_id, crew).await;
        }
    }

    /// Collect every season concurrently, then fold them in season order.
    async fn walk_seasons(
        &self,
        series_id: u64,
        seasons: u32,
        cast: &mut CastList,
        crew: &mut CrewList,
    ) {
        debug!(
            "No aggregate credits for tv {}, walking {} seasons",
            series_id, seasons
        );

        let hauls = join_all((1..=seasons).map(|season| self.fetch_season(series_id, season))).await;

        for haul in hauls.into_iter().flatten() {
            for member in &haul.cast {
                cast.add_if_absent(member);
            }
            crew.extend(haul.crew);
        }
    }

    async fn fetch_season(&self, series_id: u64, season: u32) -> Option<SeasonHaul> {
        let credits = match self.provider.season_credits(series_id, season).await {
            Ok(credits) => credits,
            Err(e) => {
                warn!(
                    "Credits for tv {} season {} unavailable: {}",
                    series_id, season, e
                );
                metrics::record_enrichment_skipped("season_credits");
                return None;
            }
        };

        let mut haul = SeasonHaul {
            crew: credits.crew.iter().flat_map(CrewEntry::expand).collect(),
            cast: credits.cast,
        };
        haul.cast.extend(credits.guest_stars);

        match self.provider.season_details(series_id, season).await {
            Ok(details) => {
                let episodes = details
                    .episodes
                    .iter()
                    .take(self.episode_limit)
                    .map(|episode| self.fetch_episode_crew(series_id, season, episode.episode_number));
                for episode_crew in join_all(episodes).await.into_iter().flatten() {
                    haul.crew.extend(episode_crew);
                }
            }
            Err(e) => {
                warn!(
                    "Episode list for tv {} season {} unavailable: {}",
                    series_id, season, e
                );
                metrics::record_enrichment_skipped("season_details");
            }
        }

        Some(haul)
    }

    /// Stunt and general crew from one episode.
    async fn fetch_episode_crew(
        &self,
        series_id: u64,
        season: u32,
        episode: u32,
    ) -> Option<Vec<CrewEntry>> {
        match self.provider.episode_credits(series_id, season, episode).await {
            Ok(credits) => Some(
                credits
                    .crew
                    .iter()
                    .flat_map(CrewEntry::expand)
                    .filter(CrewEntry::is_episode_only_contributor)
                    .collect(),
            ),
            Err(e) => {
                warn!(
                    "Credits for tv {} S{}E{} unavailable: {}",
                    series_id, season, episode, e
                );
                metrics::record_enrichment_skipped("episode_credits");
                None
            }
        }
    }

    /// The provider sometimes splits one real-world series across two
    /// records; union in the crew of the record the IMDb id resolves to.
    async fn union_duplicate_record(&self, series_id: u64, imdb_id: &str, crew: &mut CrewList) {
        let found = match self.provider.find_by_imdb_id(imdb_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!("IMDb lookup {} for tv {} failed: {}", imdb_id, series_id, e);
                metrics::record_enrichment_skipped("imdb_lookup");
                return;
            }
        };

        let Some(duplicate) = found.tv_results.first().map(|item| item.id) else {
            return;
        };
        if duplicate == series_id {
            return;
        }

        match self.provider.series_credits(duplicate).await {
            Ok(credits) => {
                let added = crew.extend_raw(&credits.crew);
                debug!(
                    "IMDb {} resolved to tv {}, added {} crew to tv {}",
                    imdb_id, duplicate, added, series_id
                );
            }
            Err(e) => {
                warn!(
                    "Credits for duplicate record tv {} unavailable: {}",
                    duplicate, e
                );
                metrics::record_enrichment_skipped("duplicate_record");
            }
        }
    }
}
