//! Background reaping of expired entries.

use super::{CacheTier, TieredCache};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn ticker(period: Duration) -> Interval {
    // First tick one period from now, not immediately
    let mut interval = interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Sweep each tier on its own cadence and force-flush the search tier,
/// until `shutdown` is cancelled.
pub(super) async fn run(cache: TieredCache, shutdown: CancellationToken) {
    let config = cache.config().clone();
    let mut metadata = ticker(config.metadata.sweep_interval);
    let mut comparison = ticker(config.comparison.sweep_interval);
    let mut search = ticker(config.search.sweep_interval);
    let mut search_flush = ticker(config.search_flush_interval);

    debug!("Cache sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = metadata.tick() => {
                cache.sweep(CacheTier::Metadata);
            }
            _ = comparison.tick() => {
                cache.sweep(CacheTier::Comparison);
            }
            _ = search.tick() => {
                cache.sweep(CacheTier::Search);
            }
            _ = search_flush.tick() => {
                cache.flush_tier(CacheTier::Search);
            }
        }
    }

    info!("Cache sweeper stopped");
}
