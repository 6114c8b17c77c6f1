//! In-memory rate limiter using governor crate.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovernorRateLimiter};

use quill_core::ports::{RateLimitError, RateLimiter, Throttle};

type KeyedRateLimiter = GovernorRateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Checks between sweeps of idle client entries.
const PRUNE_INTERVAL: u64 = 1024;

/// In-memory rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Burst size: requests a client may make back to back.
    pub max_requests: u32,
    /// Time for a spent budget to refill completely.
    pub window: Duration,
    /// Key clients on `Forwarded`/`X-Forwarded-For` instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window: Duration::from_secs(60),
            trust_forwarded_for: false,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: std::env::var("AUTH_RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_requests),
            window: std::env::var("AUTH_RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
            trust_forwarded_for: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.trust_forwarded_for),
        }
    }
}

/// Keyed GCRA limiter. Budgets live in this process only; a second
/// instance behind the same load balancer keeps its own.
///
/// Entries for clients whose budget has fully refilled are swept every
/// [`PRUNE_INTERVAL`] checks, so the key store tracks active clients only.
pub struct InMemoryRateLimiter {
    limiter: KeyedRateLimiter,
    clock: DefaultClock,
    checks: AtomicU64,
    prune_every: u64,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let burst = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(config.window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: KeyedRateLimiter::keyed(quota),
            clock: DefaultClock::default(),
            checks: AtomicU64::new(0),
            prune_every: PRUNE_INTERVAL,
        }
    }

    fn prune(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        tracing::debug!(before, after = self.limiter.len(), "Pruned idle rate limit entries");
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, client: &str) -> Result<Throttle, RateLimitError> {
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % self.prune_every == 0 {
            self.prune();
        }

        Ok(match self.limiter.check_key(&client.to_owned()) {
            Ok(()) => Throttle::Allowed,
            Err(not_until) => Throttle::Limited {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        })
    }
}
