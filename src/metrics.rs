//! Prometheus metrics.
//!
//! Recording is a no-op until [`install_recorder`] has been called, so unit
//! tests can exercise instrumented code without a global recorder.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the global Prometheus recorder on first use and return its
/// handle. Later calls (e.g. a second router in the same process) share it.
pub fn install_recorder() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Cache lookup outcome (`hit` / `miss`) per tier.
pub fn record_cache_lookup(tier: &'static str, outcome: &'static str) {
    counter!("castmatch_cache_lookups_total", "tier" => tier, "outcome" => outcome).increment(1);
}

/// Completed upstream request by final HTTP status.
pub fn record_upstream(status: u16) {
    counter!("castmatch_upstream_requests_total", "status" => status.to_string()).increment(1);
}

/// A 429 answered by the upstream and retried.
pub fn record_rate_limited() {
    counter!("castmatch_upstream_rate_limited_total").increment(1);
}

/// Optional enrichment step that failed and was skipped.
pub fn record_enrichment_skipped(stage: &'static str) {
    counter!("castmatch_enrichment_skipped_total", "stage" => stage).increment(1);
}

/// API request by endpoint and response status.
pub fn record_request(endpoint: &str, status: u16) {
    counter!(
        "castmatch_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// API request latency since `start`.
pub fn record_duration(endpoint: &str, start: Instant) {
    histogram!("castmatch_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}
