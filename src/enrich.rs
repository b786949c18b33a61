//! Batched IMDb id backfill for people the credit lists left without one.

use crate::cache::TieredCache;
use crate::metrics;
use crate::provider::MetadataProvider;
use crate::tmdb::models::ExternalIds;
use futures_util::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Cache key for a person's external ids.
pub fn cache_key(person_id: u64) -> String {
    format!("person_external_ids_{person_id}")
}

pub struct IdentityEnricher {
    provider: Arc<dyn MetadataProvider>,
    cache: TieredCache,
    batch_size: usize,
    batch_delay: Duration,
}

impl IdentityEnricher {
    pub fn new(provider: Arc<dyn MetadataProvider>, cache: TieredCache) -> Self {
        Self {
            provider,
            cache,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Lookups run concurrently in groups of `size`, with `delay` between
    /// groups.
    pub fn with_batching(mut self, size: usize, delay: Duration) -> Self {
        self.batch_size = size.max(1);
        self.batch_delay = delay;
        self
    }

    /// Resolve IMDb ids for `person_ids`. People whose lookup fails or who
    /// have no IMDb id are simply absent from the result.
    pub async fn resolve(&self, person_ids: &[u64]) -> HashMap<u64, String> {
        let mut resolved = HashMap::new();
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for &id in person_ids {
            if !seen.insert(id) {
                continue;
            }
            match self.cache.get::<ExternalIds>(&cache_key(id)) {
                Some(ids) => {
                    if let Some(imdb) = ids.imdb() {
                        resolved.insert(id, imdb.to_string());
                    }
                }
                None => pending.push(id),
            }
        }

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            let lookups = batch.iter().map(|&id| async move { (id, self.lookup(id).await) });
            for (id, imdb) in join_all(lookups).await {
                if let Some(imdb) = imdb {
                    resolved.insert(id, imdb);
                }
            }
        }

        debug!(
            "Resolved {} of {} IMDb ids ({} looked up)",
            resolved.len(),
            seen.len(),
            pending.len()
        );
        resolved
    }

    async fn lookup(&self, person_id: u64) -> Option<String> {
        match self.provider.person_external_ids(person_id).await {
            Ok(ids) => {
                let ids = Arc::new(ids);
                self.cache.set_with_ttl(
                    &cache_key(person_id),
                    Arc::clone(&ids),
                    self.cache.config().external_id_ttl,
                );
                ids.imdb().map(str::to_string)
            }
            Err(e) => {
                warn!("External ids for person {} unavailable: {}", person_id, e);
                metrics::record_enrichment_skipped("external_ids");
                None
            }
        }
    }
}
