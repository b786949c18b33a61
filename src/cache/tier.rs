use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::any::Any;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Type-erased shared value. Readers get another `Arc` to the same allocation.
pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

/// Named cache partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Production details, credits and person cross-reference ids
    Metadata,
    /// Finished comparison results
    Comparison,
    /// Search and lookup results
    Search,
}

impl CacheTier {
    pub const ALL: [CacheTier; 3] = [CacheTier::Metadata, CacheTier::Comparison, CacheTier::Search];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Metadata => "metadata",
            CacheTier::Comparison => "comparison",
            CacheTier::Search => "search",
        }
    }
}

/// Default TTL and background sweep cadence for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) value: SharedValue,
    created_at: Instant,
    ttl: Duration,
}

impl Entry {
    pub(crate) fn new(value: SharedValue, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// Point-in-time counters for one tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub tier: CacheTier,
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub default_ttl_secs: u64,
    pub last_flushed_at: Option<DateTime<Utc>>,
}

/// One partition: its entries, policy and hit/miss counters.
pub(crate) struct Tier {
    pub(crate) name: CacheTier,
    pub(crate) policy: TierPolicy,
    pub(crate) entries: DashMap<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    last_flushed_at: RwLock<Option<DateTime<Utc>>>,
}

impl Tier {
    pub(crate) fn new(name: CacheTier, policy: TierPolicy) -> Self {
        Self {
            name,
            policy,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_flushed_at: RwLock::new(None),
        }
    }

    /// Fresh value for `key`, dropping it first if it has expired.
    pub(crate) fn lookup(&self, key: &str) -> Option<SharedValue> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(Arc::clone(&entry.value)),
            Some(entry) => {
                // Release the read guard before removing
                drop(entry);
                self.entries.remove_if(key, |_, e| e.is_expired(now));
                None
            }
            None => None,
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove every expired entry, returning how many were reaped.
    pub(crate) fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Remove entries whose key contains `pattern`.
    pub(crate) fn remove_matching(&self, pattern: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let matched = key.contains(pattern);
            if matched {
                removed += 1;
            }
            !matched
        });
        removed
    }

    pub(crate) fn flush(&self) {
        self.entries.clear();
        let mut last = self
            .last_flushed_at
            .write()
            .unwrap_or_else(|p| p.into_inner());
        *last = Some(Utc::now());
    }

    pub(crate) fn stats(&self) -> TierStats {
        TierStats {
            tier: self.name,
            keys: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            default_ttl_secs: self.policy.default_ttl.as_secs(),
            last_flushed_at: *self
                .last_flushed_at
                .read()
                .unwrap_or_else(|p| p.into_inner()),
        }
    }
}
