//! In-process identity provider - used when no GoTrue instance is configured,
//! and in tests.
//!
//! Mirrors the provider behavior the application relies on: duplicate
//! sign-ups come back without identities, one-time codes are bound to a
//! PKCE challenge, and revoked tokens stop resolving.
//! Note: Accounts are lost on process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Account, AuthSession, Session};
use quill_core::ports::{AccountAdmin, IdentityError, IdentityProvider};

use crate::auth::{
    Argon2PasswordHasher, EXPIRY_LEEWAY_SECS, JwtConfig, JwtSessionIssuer, TokenError, VerifiedToken,
};

const MIN_PASSWORD_LEN: usize = 6;

struct StoredAccount {
    account: Account,
    password_hash: Option<String>,
}

struct PendingCode {
    account_id: Uuid,
    code_challenge: String,
}

/// In-memory identity provider.
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<Uuid, StoredAccount>>,
    codes: RwLock<HashMap<String, PendingCode>>,
    /// Revoked token ids and their `exp`, kept only while the token could still validate.
    revoked: RwLock<HashMap<String, i64>>,
    hasher: Argon2PasswordHasher,
    tokens: JwtSessionIssuer,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::with_jwt_config(JwtConfig::default())
    }

    pub fn with_jwt_config(config: JwtConfig) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashMap::new()),
            hasher: Argon2PasswordHasher::new(),
            tokens: JwtSessionIssuer::new(config),
        }
    }

    /// Register an account the way an OAuth provider would on first login and
    /// return a one-time code for it, bound to `code_challenge`.
    pub async fn seed_oauth_login(
        &self,
        provider: &str,
        email: &str,
        metadata: Map<String, Value>,
        code_challenge: &str,
    ) -> String {
        let account_id = {
            let mut accounts = self.accounts.write().await;
            let existing = accounts
                .values()
                .find(|s| s.account.email.as_deref() == Some(email))
                .map(|s| s.account.id);

            match existing {
                Some(id) => id,
                None => {
                    let account = Account {
                        id: Uuid::new_v4(),
                        email: Some(email.to_string()),
                        metadata,
                        identities: Some(vec![provider.to_string()]),
                    };
                    let id = account.id;
                    accounts.insert(
                        id,
                        StoredAccount {
                            account,
                            password_hash: None,
                        },
                    );
                    id
                }
            }
        };

        self.issue_code(account_id, code_challenge).await
    }

    /// The most recently issued, unredeemed code for `email` (development mailbox).
    pub async fn pending_code_for(&self, email: &str) -> Option<String> {
        let account_id = self.find_by_email(email).await?.id;
        let codes = self.codes.read().await;
        codes
            .iter()
            .find(|(_, pending)| pending.account_id == account_id)
            .map(|(code, _)| code.clone())
    }

    /// Whether an account with this id is registered.
    pub async fn contains(&self, account_id: Uuid) -> bool {
        self.accounts.read().await.contains_key(&account_id)
    }

    async fn find_by_email(&self, email: &str) -> Option<Account> {
        let accounts = self.accounts.read().await;
        accounts
            .values()
            .find(|s| s.account.email.as_deref() == Some(email))
            .map(|s| s.account.clone())
    }

    async fn issue_code(&self, account_id: Uuid, code_challenge: &str) -> String {
        let code = Uuid::new_v4().to_string();
        let mut codes = self.codes.write().await;
        // One outstanding code per account, like a fresh email link replacing the old one.
        codes.retain(|_, pending| pending.account_id != account_id);
        codes.insert(
            code.clone(),
            PendingCode {
                account_id,
                code_challenge: code_challenge.to_string(),
            },
        );
        code
    }

    fn open_session(&self, account: Account) -> Result<AuthSession, IdentityError> {
        let access_token = self
            .tokens
            .issue(account.id, account.email_or_empty())
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        Ok(AuthSession {
            session: Session {
                access_token,
                refresh_token: None,
                expires_in: Some(self.tokens.expiration_secs()),
            },
            account,
        })
    }

    fn verify(&self, session: &Session) -> Result<VerifiedToken, IdentityError> {
        self.tokens
            .validate(&session.access_token)
            .map_err(|e: TokenError| {
                tracing::debug!(error = %e, "Rejected session token");
                IdentityError::Unauthorized
            })
    }

    async fn account_for(&self, session: &Session) -> Result<Account, IdentityError> {
        let token = self.verify(session)?;
        if self.revoked.read().await.contains_key(&token.token_id) {
            return Err(IdentityError::Unauthorized);
        }

        let accounts = self.accounts.read().await;
        accounts
            .get(&token.account_id)
            .map(|s| s.account.clone())
            .ok_or(IdentityError::Unauthorized)
    }

    /// Drop revocations for tokens that expiry alone already rejects at `now`.
    async fn forget_expired_revocations(&self, now: i64) {
        let leeway = EXPIRY_LEEWAY_SECS as i64;
        self.revoked
            .write()
            .await
            .retain(|_, expires_at| *expires_at + leeway >= now);
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(status: u16, message: &str) -> IdentityError {
    IdentityError::Rejected {
        status,
        message: message.to_string(),
    }
}

fn check_password_policy(password: &str) -> Result<(), IdentityError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(rejected(
            422,
            "Password should be at least 6 characters.",
        ));
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account, IdentityError> {
        if !email.contains('@') {
            return Err(rejected(400, "Unable to validate email address: invalid format"));
        }
        check_password_policy(password)?;

        if let Some(mut existing) = self.find_by_email(email).await {
            // Same obfuscation as the hosted provider: no error, no identities.
            existing.identities = Some(Vec::new());
            return Ok(existing);
        }

        let password_hash = self
            .hasher
            .hash(password)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let account = Account {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            metadata,
            identities: Some(vec!["email".to_string()]),
        };
        self.accounts.write().await.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash: Some(password_hash),
            },
        );

        tracing::debug!(account_id = %account.id, "Registered development account");
        Ok(account)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, IdentityError> {
        let (account, password_hash) = {
            let accounts = self.accounts.read().await;
            let stored = accounts
                .values()
                .find(|s| s.account.email.as_deref() == Some(email))
                .ok_or_else(|| rejected(400, "Invalid login credentials"))?;
            (stored.account.clone(), stored.password_hash.clone())
        };

        let Some(password_hash) = password_hash else {
            return Err(rejected(400, "Invalid login credentials"));
        };
        let valid = self
            .hasher
            .verify(password, &password_hash)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
        if !valid {
            return Err(rejected(400, "Invalid login credentials"));
        }

        self.open_session(account)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), IdentityError> {
        self.account_for(session).await?;
        let token = self.verify(session)?;

        self.forget_expired_revocations(Utc::now().timestamp()).await;
        self.revoked
            .write()
            .await
            .insert(token.token_id, token.expires_at);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), IdentityError> {
        // Unknown addresses succeed silently so the response does not reveal accounts.
        if let Some(account) = self.find_by_email(email).await {
            let code = self.issue_code(account.id, code_challenge).await;
            tracing::info!(
                account_id = %account.id,
                link = %format!("{redirect_to}?code={code}"),
                "Development mailbox: password reset link"
            );
        }
        Ok(())
    }

    async fn update_password(
        &self,
        session: &Session,
        new_password: &str,
    ) -> Result<Account, IdentityError> {
        let account = self.account_for(session).await?;
        check_password_policy(new_password)?;

        let password_hash = self
            .hasher
            .hash(new_password)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let mut accounts = self.accounts.write().await;
        let stored = accounts
            .get_mut(&account.id)
            .ok_or(IdentityError::Unauthorized)?;
        stored.password_hash = Some(password_hash);
        Ok(stored.account.clone())
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, IdentityError> {
        let pending = self
            .codes
            .write()
            .await
            .remove(code)
            .ok_or_else(|| rejected(404, "invalid flow state, no valid flow state found"))?;

        if code_verifier != Some(pending.code_challenge.as_str()) {
            return Err(rejected(
                400,
                "code challenge does not match previously saved code verifier",
            ));
        }

        let account = {
            let accounts = self.accounts.read().await;
            accounts
                .get(&pending.account_id)
                .map(|s| s.account.clone())
                .ok_or_else(|| rejected(404, "User not found"))?
        };

        self.open_session(account)
    }

    async fn get_user(&self, session: &Session) -> Result<Account, IdentityError> {
        self.account_for(session).await
    }

    fn authorize_url(
        &self,
        provider: &str,
        _redirect_to: &str,
        _code_challenge: &str,
    ) -> Result<String, IdentityError> {
        Err(rejected(
            400,
            &format!("OAuth provider '{provider}' requires a hosted identity provider"),
        ))
    }
}

#[async_trait]
impl AccountAdmin for InMemoryIdentityProvider {
    async fn delete_account(&self, account_id: Uuid) -> Result<(), IdentityError> {
        let removed = self.accounts.write().await.remove(&account_id);
        if removed.is_none() {
            return Err(rejected(404, "User not found"));
        }
        self.codes
            .write()
            .await
            .retain(|_, pending| pending.account_id != account_id);
        Ok(())
    }
}
