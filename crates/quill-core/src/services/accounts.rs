//! Account lifecycle: sign-up, sign-in, OAuth provisioning, password reset
//! and account deletion.

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{
    Account, AuthSession, NewProfile, OAUTH_HANDLE_KEY, Profile, SIGN_UP_USERNAME_KEY, Session,
};
use crate::error::DomainError;
use crate::ports::{AccountAdmin, IdentityError, IdentityProvider, ProfileRepository};
use crate::username::UsernameResolver;

use super::{mask_email, session_error};

/// Phrase a caller must echo back to delete their account.
pub const DELETE_CONFIRMATION_PHRASE: &str = "SURE-DELETE-ACCOUNT";

/// Profile inserts attempted before giving up on concurrent username claims.
const PROFILE_INSERT_ATTEMPTS: u32 = 3;

/// A PKCE verifier (plain method, so it doubles as the challenge).
fn new_code_verifier() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Everything the browser needs to start an OAuth login.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub url: String,
    /// PKCE verifier to replay when the provider calls back.
    pub code_verifier: String,
}

/// Orchestrates the identity provider and the profile store.
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    admin: Arc<dyn AccountAdmin>,
    profiles: Arc<dyn ProfileRepository>,
    resolver: UsernameResolver,
    site_url: String,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        admin: Arc<dyn AccountAdmin>,
        profiles: Arc<dyn ProfileRepository>,
        resolver: UsernameResolver,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            admin,
            profiles,
            resolver,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Register an account with an explicitly chosen username.
    ///
    /// The username is checked but not reserved: the profile row is created
    /// on first sign-in.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, DomainError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(DomainError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let username = self.resolver.policy().sign_up_candidate(username);
        if username.is_empty() {
            return Err(DomainError::Validation(
                "Username must contain letters or digits".to_string(),
            ));
        }

        if self.profiles.username_exists(&username).await? {
            return Err(DomainError::UsernameTaken(username));
        }

        let mut metadata = Map::new();
        metadata.insert(SIGN_UP_USERNAME_KEY.to_string(), Value::from(username.clone()));

        let account = self
            .identity
            .sign_up(email, password, metadata)
            .await
            .map_err(|e| DomainError::Identity(e.message()))?;

        if account.is_masked_duplicate() {
            return Err(DomainError::AlreadyRegistered);
        }

        tracing::info!(account_id = %account.id, %username, "Account registered");
        Ok(account)
    }

    /// Authenticate with a password, provisioning the profile on first sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, DomainError> {
        let auth = self
            .identity
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| match e {
                IdentityError::Rejected { message, .. } => DomainError::InvalidCredentials(message),
                IdentityError::Unauthorized => {
                    DomainError::InvalidCredentials("Invalid login credentials".to_string())
                }
                other => DomainError::Identity(other.message()),
            })?;

        if self.profiles.find_by_email(email).await?.is_none() {
            let raw = auth.account.metadata_str(SIGN_UP_USERNAME_KEY);
            self.provision_profile(&auth.account, email, raw).await?;
        }

        tracing::info!(account_id = %auth.account.id, "Signed in");
        Ok(auth)
    }

    /// Revoke the caller's session at the provider.
    pub async fn sign_out(&self, session: &Session) -> Result<(), DomainError> {
        self.identity
            .sign_out(session)
            .await
            .map_err(|e| DomainError::Identity(e.message()))
    }

    /// The account behind a session.
    pub async fn current_account(&self, session: &Session) -> Result<Account, DomainError> {
        self.identity.get_user(session).await.map_err(session_error)
    }

    /// Build the provider authorization URL for an OAuth login.
    pub fn begin_oauth(&self, provider: &str) -> Result<OAuthStart, DomainError> {
        let valid = !provider.is_empty()
            && provider
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err(DomainError::Validation(format!(
                "Unsupported OAuth provider: {provider}"
            )));
        }

        let code_verifier = new_code_verifier();
        let redirect_to = format!("{}/auth/callback", self.site_url);
        let url = self
            .identity
            .authorize_url(provider, &redirect_to, &code_verifier)
            .map_err(|e| DomainError::Identity(e.message()))?;

        Ok(OAuthStart { url, code_verifier })
    }

    /// Finish an OAuth login: exchange the code and make sure a profile exists.
    ///
    /// Unlike password sign-in, the profile is looked up by account id.
    pub async fn complete_oauth(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, DomainError> {
        let exchanged = self
            .identity
            .exchange_code_for_session(code, code_verifier)
            .await
            .map_err(|e| DomainError::InvalidCode(e.message()))?;

        let account = self
            .identity
            .get_user(&exchanged.session)
            .await
            .map_err(session_error)?;

        if self.profiles.find_by_user_id(account.id).await?.is_none() {
            let raw = account.metadata_str(OAUTH_HANDLE_KEY);
            self.provision_profile(&account, account.email_or_empty(), raw)
                .await?;
        }

        tracing::info!(account_id = %account.id, "OAuth login completed");
        Ok(AuthSession {
            session: exchanged.session,
            account,
        })
    }

    /// Ask the provider to mail a password reset link.
    ///
    /// Returns the PKCE verifier the reset code will be bound to; the caller
    /// keeps it until the code is redeemed.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, DomainError> {
        if email.trim().is_empty() {
            return Err(DomainError::Validation("Email is required".to_string()));
        }

        let code_verifier = new_code_verifier();
        let redirect_to = format!("{}/reset-password", self.site_url);
        self.identity
            .reset_password_for_email(email, &redirect_to, &code_verifier)
            .await
            .map_err(|e| DomainError::Identity(e.message()))?;

        tracing::info!(email = %mask_email(email), "Password reset requested");
        Ok(code_verifier)
    }

    /// Redeem a reset code and set a new password.
    pub async fn reset_password(
        &self,
        code: &str,
        code_verifier: Option<&str>,
        new_password: &str,
    ) -> Result<(), DomainError> {
        if new_password.is_empty() {
            return Err(DomainError::Validation("Password is required".to_string()));
        }

        let exchanged = self
            .identity
            .exchange_code_for_session(code, code_verifier)
            .await
            .map_err(|e| DomainError::InvalidCode(e.message()))?;

        let account = self
            .identity
            .update_password(&exchanged.session, new_password)
            .await
            .map_err(|e| DomainError::Update(e.message()))?;

        tracing::info!(account_id = %account.id, "Password updated");
        Ok(())
    }

    /// Delete the caller's profile, then their account.
    ///
    /// The two steps are not atomic: if the account deletion fails the
    /// profile stays deleted while the account survives.
    pub async fn delete_account(&self, session: &Session) -> Result<(), DomainError> {
        let account = self
            .identity
            .get_user(session)
            .await
            .map_err(session_error)?;

        let removed = self
            .profiles
            .delete_by_email(account.email_or_empty())
            .await
            .map_err(|e| DomainError::ProfileDeletion(e.to_string()))?;
        tracing::debug!(account_id = %account.id, removed, "Profile rows deleted");

        if let Err(e) = self.admin.delete_account(account.id).await {
            tracing::error!(
                account_id = %account.id,
                error = %e,
                "Account deletion failed after profile removal; account left without profile"
            );
            return Err(DomainError::AccountDeletion(e.message()));
        }

        tracing::info!(account_id = %account.id, "Account deleted");
        Ok(())
    }

    /// Create the profile row for an account that has none yet.
    ///
    /// A uniqueness violation on insert is expected under concurrency: either
    /// a parallel sign-in already created this account's profile, or another
    /// account claimed the resolved username first.
    async fn provision_profile(
        &self,
        account: &Account,
        email: &str,
        raw_username: Option<&str>,
    ) -> Result<Profile, DomainError> {
        let base = self.resolver.policy().provisioning_base(raw_username);

        for attempt in 1..=PROFILE_INSERT_ATTEMPTS {
            let username = self.resolver.resolve(&base, self.profiles.as_ref()).await?;

            let new_profile = NewProfile {
                user_id: account.id,
                email: email.to_string(),
                username,
            };
            match self.profiles.insert(new_profile).await {
                Ok(profile) => {
                    tracing::info!(
                        account_id = %account.id,
                        username = %profile.username,
                        "Profile created"
                    );
                    return Ok(profile);
                }
                Err(e) if e.is_constraint() => {
                    if let Some(existing) = self.profiles.find_by_user_id(account.id).await? {
                        return Ok(existing);
                    }
                    tracing::warn!(attempt, %base, "Username claimed concurrently, resolving again");
                }
                Err(e) => return Err(DomainError::ProfileCreation(e.to_string())),
            }
        }

        Err(DomainError::ProfileCreation(format!(
            "username derived from '{base}' kept colliding"
        )))
    }
}
