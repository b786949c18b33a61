//! Outbound pacing and transparent retry on upstream rate limiting.
//!
//! [`send_with_rate_limit_retry`] re-sends exactly the request that was
//! answered with `429 Too Many Requests`, after the delay advertised in the
//! `retry-after` header. Every other status is returned to the caller
//! untouched.

use crate::error::{CastmatchError, Result};
use crate::metrics;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Default number of 429 responses absorbed before giving up.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Delay used when a 429 carries no usable `retry-after` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Configuration for [`send_with_rate_limit_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// How many consecutive 429s are retried before the call fails.
    pub max_rate_limit_retries: u32,
    /// Wait applied when the upstream does not say how long to back off.
    pub default_retry_after: Duration,
    /// Optional per-request timeout applied to each individual attempt.
    ///
    /// When `None`, the client's own timeout applies.
    pub timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            default_retry_after: DEFAULT_RETRY_AFTER,
            timeout: None,
        }
    }
}

/// Spaces outbound requests at least `delay` apart.
///
/// Callers reserve the next free send slot under a lock, then sleep until
/// it outside the lock, so concurrent requests are serialized without
/// holding the lock across an await.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    next_slot: Mutex<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for this caller's send slot.
    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().unwrap_or_else(|p| p.into_inner());
            let slot = (*next).max(Instant::now());
            *next = slot + self.delay;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Longest upstream-advertised pause honoured before a retry
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Read `retry-after` as a number of seconds, falling back to `default`.
/// Values are capped at [`MAX_RETRY_AFTER`].
pub fn parse_retry_after(headers: &HeaderMap, default: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER))
        .unwrap_or(default)
        .min(MAX_RETRY_AFTER)
}

/// Send `request`, pacing it through `pacer` and re-sending it whenever the
/// upstream answers 429.
///
/// # Errors
///
/// Network failures surface as [`CastmatchError::Http`]. If the upstream is
/// still rate limiting after `config.max_rate_limit_retries` retries, returns
/// [`CastmatchError::RateLimited`] with the last advertised delay.
pub async fn send_with_rate_limit_retry(
    request: RequestBuilder,
    pacer: &Pacer,
    config: &RetryConfig,
) -> Result<Response> {
    let mut retries = 0;

    loop {
        let mut attempt = request.try_clone().ok_or_else(|| {
            CastmatchError::Internal("Streaming request bodies cannot be retried".to_string())
        })?;
        if let Some(timeout) = config.timeout {
            attempt = attempt.timeout(timeout);
        }

        pacer.wait().await;
        let response = attempt.send().await?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        metrics::record_rate_limited();
        let retry_after = parse_retry_after(response.headers(), config.default_retry_after);

        if retries >= config.max_rate_limit_retries {
            warn!(
                "Still rate limited by {} after {} retries, giving up",
                response.url(),
                retries
            );
            return Err(CastmatchError::RateLimited { retry_after });
        }

        retries += 1;
        warn!(
            "Rate limited by {}. Retrying after {}ms (retry {}/{})",
            response.url().path(),
            retry_after.as_millis(),
            retries,
            config.max_rate_limit_retries
        );
        tokio::time::sleep(retry_after).await;
    }
}
