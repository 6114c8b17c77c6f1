//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod identity;
mod rate_limit;
mod repository;

pub use identity::{AccountAdmin, IdentityError, IdentityProvider};
pub use rate_limit::{RateLimitError, RateLimiter, Throttle};
pub use repository::{PostRepository, ProfileRepository};
