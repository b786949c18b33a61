//! Process-wide tiered cache.
//!
//! Keys are routed to a tier by prefix (`project_`/`credits_` → metadata,
//! `comparison_` → comparison, `search_` → search, anything else →
//! metadata), so call sites only pick a meaningful key and the tier's TTL
//! policy follows. Values are stored behind `Arc` and handed back shared,
//! never copied.

mod sweeper;
mod tier;

pub use tier::{CacheTier, TierPolicy, TierStats};

use crate::models::Production;
use serde::Serialize;
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tier::{Entry, Tier};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Key prefixes and the tier each routes to. Unmatched keys use metadata.
const ROUTES: [(&str, CacheTier); 4] = [
    ("project_", CacheTier::Metadata),
    ("credits_", CacheTier::Metadata),
    ("comparison_", CacheTier::Comparison),
    ("search_", CacheTier::Search),
];

const DEFAULT_TIER: CacheTier = CacheTier::Metadata;

/// Tier policies plus the cadence of the forced search flush.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub metadata: TierPolicy,
    pub comparison: TierPolicy,
    pub search: TierPolicy,
    /// The search tier is emptied on this cadence regardless of TTLs
    pub search_flush_interval: Duration,
    /// TTL for person cross-reference ids
    pub external_id_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata: TierPolicy {
                default_ttl: Duration::from_secs(24 * 60 * 60),
                sweep_interval: Duration::from_secs(10 * 60),
            },
            comparison: TierPolicy {
                default_ttl: Duration::from_secs(12 * 60 * 60),
                sweep_interval: Duration::from_secs(10 * 60),
            },
            search: TierPolicy {
                default_ttl: Duration::from_secs(60 * 60),
                sweep_interval: Duration::from_secs(5 * 60),
            },
            search_flush_interval: Duration::from_secs(24 * 60 * 60),
            external_id_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Snapshot of every tier's counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub tiers: Vec<TierStats>,
}

impl CacheStats {
    pub fn tier(&self, tier: CacheTier) -> Option<&TierStats> {
        self.tiers.iter().find(|t| t.tier == tier)
    }
}

struct Inner {
    metadata: Tier,
    comparison: Tier,
    search: Tier,
    config: CacheConfig,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Thread-safe tiered cache. Cloning shares the same underlying stores.
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl TieredCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                metadata: Tier::new(CacheTier::Metadata, config.metadata),
                comparison: Tier::new(CacheTier::Comparison, config.comparison),
                search: Tier::new(CacheTier::Search, config.search),
                config,
                shutdown: CancellationToken::new(),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Tier a key is stored in.
    pub fn route(key: &str) -> CacheTier {
        ROUTES
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix))
            .map(|(_, tier)| *tier)
            .unwrap_or(DEFAULT_TIER)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn tier(&self, tier: CacheTier) -> &Tier {
        match tier {
            CacheTier::Metadata => &self.inner.metadata,
            CacheTier::Comparison => &self.inner.comparison,
            CacheTier::Search => &self.inner.search,
        }
    }

    fn tier_for(&self, key: &str) -> &Tier {
        self.tier(Self::route(key))
    }

    /// Shared handle to the cached value, or `None` when absent, expired or
    /// stored under a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let tier = self.tier_for(key);

        let value = tier.lookup(key).and_then(|value| match value.downcast::<T>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                warn!("Cache entry {} holds an unexpected type, ignoring", key);
                None
            }
        });

        let outcome = if value.is_some() {
            tier.record_hit();
            "hit"
        } else {
            tier.record_miss();
            "miss"
        };
        debug!("Cache {} [{}]: {}", outcome.to_uppercase(), tier.name.as_str(), key);
        crate::metrics::record_cache_lookup(tier.name.as_str(), outcome);

        value
    }

    /// Store `value` with the tier's default TTL.
    pub fn set<T: Any + Send + Sync>(&self, key: &str, value: Arc<T>) {
        let ttl = self.tier_for(key).policy.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Store `value` with an explicit TTL.
    pub fn set_with_ttl<T: Any + Send + Sync>(&self, key: &str, value: Arc<T>, ttl: Duration) {
        let tier = self.tier_for(key);
        tier.entries.insert(key.to_string(), Entry::new(value, ttl));
        debug!(
            "Cache SET [{}]: {} (ttl {}s)",
            tier.name.as_str(),
            key,
            ttl.as_secs()
        );
    }

    /// Remove one key. Returns the number of entries removed (0 or 1).
    pub fn delete(&self, key: &str) -> usize {
        usize::from(self.tier_for(key).entries.remove(key).is_some())
    }

    /// Empty every tier.
    pub fn flush_all(&self) {
        for tier in CacheTier::ALL {
            self.tier(tier).flush();
        }
        info!("All caches flushed");
    }

    /// Empty a single tier.
    pub fn flush_tier(&self, tier: CacheTier) {
        self.tier(tier).flush();
        info!("{} cache flushed", tier.as_str());
    }

    /// Remove every comparison entry whose key contains `pattern`.
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        self.inner.comparison.remove_matching(pattern)
    }

    /// Drop everything derived from `production`: its details, its credits
    /// and any comparison that includes it.
    pub fn invalidate_production(&self, production: &Production) -> usize {
        let composite = production.composite_id();
        let removed = self.delete(&format!("project_{composite}"))
            + self.delete(&format!("credits_{composite}"))
            + self.invalidate_matching(&composite);
        info!("Cache invalidated for {} ({} entries)", production, removed);
        removed
    }

    /// Reap expired entries in one tier.
    pub fn sweep(&self, tier: CacheTier) -> usize {
        let reaped = self.tier(tier).sweep_expired();
        if reaped > 0 {
            debug!("Swept {} expired {} entries", reaped, tier.as_str());
        }
        reaped
    }

    /// Stored entries in a tier, including expired ones not yet reaped.
    pub fn len(&self, tier: CacheTier) -> usize {
        self.tier(tier).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        CacheTier::ALL.iter().all(|t| self.len(*t) == 0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tiers: CacheTier::ALL.iter().map(|t| self.tier(*t).stats()).collect(),
        }
    }

    /// Start the background sweep task. Calling it again is a no-op.
    pub fn spawn_sweeper(&self) {
        let mut slot = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return;
        }
        *slot = Some(tokio::spawn(sweeper::run(
            self.clone(),
            self.inner.shutdown.clone(),
        )));
    }

    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!("Cache sweeper ended abnormally: {}", e);
        }
    }
}

impl Default for TieredCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
