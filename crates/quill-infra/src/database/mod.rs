//! Profile and post persistence.

mod connections;
mod memory;

#[cfg(feature = "postgres")]
mod postgres_base;
#[cfg(feature = "postgres")]
pub mod postgres_repo;

#[cfg(feature = "postgres")]
pub mod entity;

pub use connections::DatabaseConfig;
#[cfg(feature = "postgres")]
pub use connections::connect;
pub use memory::{InMemoryPostRepository, InMemoryProfileRepository};

#[cfg(feature = "postgres")]
pub use postgres_repo::{PostgresPostRepository, PostgresProfileRepository};
