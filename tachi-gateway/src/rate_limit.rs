//! Per-IP rate limiting over the shared KVS.
//!
//! Fixed 60 s windows: each request increments `rate:<ip>:<window>` where
//! `window = unix_seconds / 60`. The counter's TTL is window + grace so
//! abandoned windows clean themselves up. Counting is best-effort — windows
//! need not be linearizable across gateway instances.
//!
//! When the KVS is unreachable the limiter fails OPEN: availability of the
//! publisher's content wins over strict throttling. Every fail-open decision
//! increments a counter surfaced in `/health/detailed` so operators can see
//! degraded protection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tachi::Kvs;

/// Window length.
pub const WINDOW_SECS: u64 = 60;

/// Counter TTL: one window plus grace.
const COUNTER_TTL: Duration = Duration::from_secs(120);

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Configured requests per window.
    pub limit: u32,
    /// Requests left in this window after the current one.
    pub remaining: u32,
    /// Seconds until the current window resets.
    pub retry_after: u64,
}

/// KVS-backed fixed-window rate limiter.
pub struct RateLimiter {
    kvs: Arc<dyn Kvs>,
    limit: u32,
    fail_open: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("fail_open", &self.fail_open)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter allowing `limit` requests per IP per window.
    #[must_use]
    pub fn new(kvs: Arc<dyn Kvs>, limit: u32) -> Self {
        Self {
            kvs,
            limit,
            fail_open: AtomicU64::new(0),
        }
    }

    /// Checks and consumes one request slot for `ip`.
    ///
    /// Never fails: a KVS error is logged, counted, and the request is
    /// allowed through.
    pub async fn check(&self, ip: &str) -> RateDecision {
        let now = unix_now();
        let window = now / WINDOW_SECS;
        let retry_after = WINDOW_SECS - (now % WINDOW_SECS);
        let key = format!("rate:{ip}:{window}");

        match self.kvs.incr(&key, COUNTER_TTL).await {
            Ok(count) => {
                let count = u32::try_from(count).unwrap_or(u32::MAX);
                RateDecision {
                    allowed: count <= self.limit,
                    limit: self.limit,
                    remaining: self.limit.saturating_sub(count),
                    retry_after,
                }
            }
            Err(error) => {
                self.fail_open.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(client_ip = %ip, %error, "rate-limit store unavailable, failing open");
                RateDecision {
                    allowed: true,
                    limit: self.limit,
                    remaining: self.limit,
                    retry_after,
                }
            }
        }
    }

    /// Number of requests admitted because the KVS was unreachable.
    #[must_use]
    pub fn fail_open_count(&self) -> u64 {
        self.fail_open.load(Ordering::Relaxed)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
