//! Application services - orchestration over the ports.

mod accounts;
mod posts;

pub use accounts::{AccountService, DELETE_CONFIRMATION_PHRASE, OAuthStart};
pub use posts::{ForeignPostPolicy, PostService};

use crate::error::DomainError;
use crate::ports::IdentityError;

/// Map a failed session lookup: invalid sessions mean "not signed in",
/// anything else is a provider problem.
fn session_error(err: IdentityError) -> DomainError {
    if err.is_invalid_session() {
        DomainError::NotAuthenticated
    } else {
        DomainError::Identity(err.message())
    }
}

/// Mask an email for logging to avoid PII in logs.
pub(crate) fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) if local.len() > 1 => format!("{first}***@{domain}"),
            _ => format!("***@{domain}"),
        },
        None => "***".to_string(),
    }
}
