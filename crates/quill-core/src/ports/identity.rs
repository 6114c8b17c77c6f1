//! Identity provider ports.
//!
//! Credentials, sessions and OAuth are owned by an external provider. The
//! application only talks to it through these two traits; the privileged
//! [`AccountAdmin`] capability is kept separate so that end-user code paths
//! never hold the elevated credential.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{Account, AuthSession, Session};

/// Session and credential management on behalf of end users.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new account, attaching `metadata` to it.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account, IdentityError>;

    /// Authenticate with email and password.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, IdentityError>;

    /// Revoke a session.
    async fn sign_out(&self, session: &Session) -> Result<(), IdentityError>;

    /// Send a password reset link that lands on `redirect_to`.
    ///
    /// The code in the link is bound to `code_challenge` (PKCE, plain method).
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), IdentityError>;

    /// Replace the password of the session's account.
    async fn update_password(
        &self,
        session: &Session,
        new_password: &str,
    ) -> Result<Account, IdentityError>;

    /// Exchange a one-time code (OAuth or password recovery) for a session.
    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, IdentityError>;

    /// Resolve the account behind a session.
    async fn get_user(&self, session: &Session) -> Result<Account, IdentityError>;

    /// URL the browser is sent to in order to start an OAuth login.
    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<String, IdentityError>;
}

/// Privileged account administration (service-role credential).
#[async_trait]
pub trait AccountAdmin: Send + Sync {
    async fn delete_account(&self, account_id: Uuid) -> Result<(), IdentityError>;
}

/// Identity provider errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider answered and refused the operation.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The session is missing, expired or revoked.
    #[error("Session is not valid")]
    Unauthorized,

    #[error("Identity provider unreachable: {0}")]
    Transport(String),

    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

impl IdentityError {
    /// The provider refused the session itself (missing, expired, revoked).
    ///
    /// Outages and other refusals are not session problems and must not read
    /// as "signed out".
    pub fn is_invalid_session(&self) -> bool {
        matches!(
            self,
            IdentityError::Unauthorized | IdentityError::Rejected { status: 401 | 403, .. }
        )
    }

    /// Human-readable message suitable for surfacing to the caller.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
