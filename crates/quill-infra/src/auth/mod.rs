//! Credential primitives for the development identity stand-in.

mod jwt;
mod password;

pub use jwt::{EXPIRY_LEEWAY_SECS, JwtConfig, JwtSessionIssuer, TokenError, VerifiedToken};
pub use password::{Argon2PasswordHasher, PasswordError};
