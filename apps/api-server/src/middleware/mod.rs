//! Middleware modules.

pub mod error;
pub mod session;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;
