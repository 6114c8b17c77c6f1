//! Identity provider adapters.

mod gotrue;

#[cfg(feature = "auth")]
mod memory;

pub use gotrue::{DisabledAccountAdmin, GoTrueAdmin, GoTrueClient, GoTrueConfig};

#[cfg(feature = "auth")]
pub use memory::InMemoryIdentityProvider;
