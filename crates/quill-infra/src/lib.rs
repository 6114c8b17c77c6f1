//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`:
//! the GoTrue identity client, profile/post repositories and rate limiting.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - GoTrue client and in-memory repositories only
//! - `postgres` - PostgreSQL repositories via SeaORM
//! - `auth` - In-process identity provider (Argon2 + JWT) for development and tests
//! - `rate-limit` - Rate limiting via governor

pub mod database;
pub mod identity;

#[cfg(feature = "auth")]
pub mod auth;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-exports - In-Memory
pub use database::{DatabaseConfig, InMemoryPostRepository, InMemoryProfileRepository};

// Re-exports - Identity
pub use identity::{DisabledAccountAdmin, GoTrueAdmin, GoTrueClient, GoTrueConfig};
#[cfg(feature = "auth")]
pub use identity::InMemoryIdentityProvider;

#[cfg(feature = "postgres")]
pub use database::{PostgresPostRepository, PostgresProfileRepository};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};
