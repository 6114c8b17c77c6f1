use serde::{Deserialize, Serialize};

use super::Account;

/// Credentials of an authenticated caller, as issued by the identity provider.
///
/// Passed explicitly into every operation acting on behalf of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl Session {
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            refresh_token: None,
            expires_in: None,
        }
    }
}

/// Result of a successful credential exchange.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session: Session,
    pub account: Account,
}
