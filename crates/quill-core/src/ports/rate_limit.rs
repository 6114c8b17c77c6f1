//! Throttling port for credential endpoints.

use async_trait::async_trait;
use std::time::Duration;

/// Outcome of recording one request against a client's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    Allowed,
    /// Budget spent; the client may retry after the given delay.
    Limited { retry_after: Duration },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request from `client` (usually its address).
    async fn check(&self, client: &str) -> Result<Throttle, RateLimitError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}
