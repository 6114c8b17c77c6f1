//! GoTrue (Supabase Auth) HTTP client.
//!
//! Two clients share the wire format: [`GoTrueClient`] acts on behalf of end
//! users with the public key, [`GoTrueAdmin`] holds the service-role key and
//! only exposes account deletion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use quill_core::domain::{Account, AuthSession, Session};
use quill_core::ports::{AccountAdmin, IdentityError, IdentityProvider};

/// Identity provider configuration.
#[derive(Debug, Clone)]
pub struct GoTrueConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Public (anon) API key.
    pub anon_key: String,
    /// Privileged key; required for account deletion.
    pub service_role_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GoTrueConfig {
    /// Load from `SUPABASE_*` variables; `None` when no provider is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY").unwrap_or_else(|_| {
            tracing::warn!("SUPABASE_ANON_KEY not set; identity requests will be rejected");
            String::new()
        });

        Some(Self {
            base_url,
            anon_key,
            service_role_key: std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
            timeout: Duration::from_secs(
                std::env::var("IDENTITY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }

    fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base_url.trim_end_matches('/'))
    }

    fn http_client(&self) -> Result<reqwest::Client, IdentityError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct WireIdentity {
    provider: String,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Map<String, Value>,
    #[serde(default)]
    identities: Option<Vec<WireIdentity>>,
}

impl From<WireUser> for Account {
    fn from(user: WireUser) -> Self {
        Self {
            id: user.id,
            email: user.email.filter(|e| !e.is_empty()),
            metadata: user.user_metadata,
            identities: user
                .identities
                .map(|ids| ids.into_iter().map(|i| i.provider).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    user: WireUser,
}

impl From<WireSession> for AuthSession {
    fn from(wire: WireSession) -> Self {
        Self {
            session: Session {
                access_token: wire.access_token,
                refresh_token: wire.refresh_token,
                expires_in: wire.expires_in,
            },
            account: wire.user.into(),
        }
    }
}

/// Sign-up answers with a session when email confirmation is off, with the
/// bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(WireSession),
    User(WireUser),
}

/// Error body; GoTrue versions disagree on the field carrying the message.
#[derive(Debug, Default, Deserialize)]
struct WireError {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl WireError {
    fn into_message(self, status: StatusCode) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Identity provider error")
                    .to_string()
            })
    }
}

async fn check_status(response: Response) -> Result<Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(IdentityError::Unauthorized);
    }

    let body: WireError = response.json().await.unwrap_or_default();
    Err(IdentityError::Rejected {
        status: status.as_u16(),
        message: body.into_message(status),
    })
}

async fn send(request: RequestBuilder) -> Result<Response, IdentityError> {
    let response = request
        .send()
        .await
        .map_err(|e| IdentityError::Transport(e.to_string()))?;
    check_status(response).await
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, IdentityError> {
    send(request)
        .await?
        .json()
        .await
        .map_err(|e| IdentityError::InvalidResponse(e.to_string()))
}

/// End-user GoTrue client.
pub struct GoTrueClient {
    http: reqwest::Client,
    auth_url: String,
    api_key: String,
}

impl GoTrueClient {
    pub fn new(config: &GoTrueConfig) -> Result<Self, IdentityError> {
        Ok(Self {
            http: config.http_client()?,
            auth_url: config.auth_url(),
            api_key: config.anon_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.auth_url, path))
            .header("apikey", &self.api_key)
    }

    fn authed(&self, method: Method, path: &str, session: &Session) -> RequestBuilder {
        self.request(method, path).bearer_auth(&session.access_token)
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account, IdentityError> {
        let body = json!({ "email": email, "password": password, "data": metadata });
        let response: SignUpResponse =
            send_json(self.request(Method::POST, "/signup").json(&body)).await?;

        Ok(match response {
            SignUpResponse::Session(session) => session.user.into(),
            SignUpResponse::User(user) => user.into(),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, IdentityError> {
        let body = json!({ "email": email, "password": password });
        let session: WireSession = send_json(
            self.request(Method::POST, "/token")
                .query(&[("grant_type", "password")])
                .json(&body),
        )
        .await?;

        Ok(session.into())
    }

    async fn sign_out(&self, session: &Session) -> Result<(), IdentityError> {
        send(self.authed(Method::POST, "/logout", session)).await?;
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), IdentityError> {
        let body = json!({
            "email": email,
            "code_challenge": code_challenge,
            "code_challenge_method": "plain",
        });
        send(
            self.request(Method::POST, "/recover")
                .query(&[("redirect_to", redirect_to)])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        session: &Session,
        new_password: &str,
    ) -> Result<Account, IdentityError> {
        let body = json!({ "password": new_password });
        let user: WireUser = send_json(self.authed(Method::PUT, "/user", session).json(&body)).await?;
        Ok(user.into())
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthSession, IdentityError> {
        let body = json!({
            "auth_code": code,
            "code_verifier": code_verifier.unwrap_or_default(),
        });
        let session: WireSession = send_json(
            self.request(Method::POST, "/token")
                .query(&[("grant_type", "pkce")])
                .json(&body),
        )
        .await?;

        Ok(session.into())
    }

    async fn get_user(&self, session: &Session) -> Result<Account, IdentityError> {
        let user: WireUser = send_json(self.authed(Method::GET, "/user", session)).await?;
        Ok(user.into())
    }

    fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<String, IdentityError> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.auth_url),
            &[
                ("provider", provider),
                ("redirect_to", redirect_to),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "plain"),
            ],
        )
        .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        Ok(url.into())
    }
}

/// Service-role GoTrue client.
pub struct GoTrueAdmin {
    http: reqwest::Client,
    auth_url: String,
    service_role_key: String,
}

impl GoTrueAdmin {
    /// `None` when the configuration carries no service-role key.
    pub fn new(config: &GoTrueConfig) -> Result<Option<Self>, IdentityError> {
        let Some(service_role_key) = config.service_role_key.clone() else {
            return Ok(None);
        };

        Ok(Some(Self {
            http: config.http_client()?,
            auth_url: config.auth_url(),
            service_role_key,
        }))
    }
}

#[async_trait]
impl AccountAdmin for GoTrueAdmin {
    async fn delete_account(&self, account_id: Uuid) -> Result<(), IdentityError> {
        let request = self
            .http
            .delete(format!("{}/admin/users/{}", self.auth_url, account_id))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key);

        send(request).await?;
        Ok(())
    }
}

/// Stand-in used when no service-role key is configured: every deletion fails.
pub struct DisabledAccountAdmin;

#[async_trait]
impl AccountAdmin for DisabledAccountAdmin {
    async fn delete_account(&self, _account_id: Uuid) -> Result<(), IdentityError> {
        Err(IdentityError::Rejected {
            status: 503,
            message: "Account administration is not configured".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GoTrueConfig {
        GoTrueConfig {
            base_url: "https://project.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_auth_url_strips_trailing_slash() {
        assert_eq!(config().auth_url(), "https://project.supabase.co/auth/v1");
    }

    #[test]
    fn test_authorize_url_encodes_params() {
        let client = GoTrueClient::new(&config()).unwrap();

        let url = client
            .authorize_url("github", "http://localhost:8080/auth/callback", "verifier")
            .unwrap();

        assert!(url.starts_with("https://project.supabase.co/auth/v1/authorize?provider=github"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"));
        assert!(url.contains("code_challenge=verifier"));
        assert!(url.contains("code_challenge_method=plain"));
    }

    #[test]
    fn test_admin_requires_service_role_key() {
        assert!(GoTrueAdmin::new(&config()).unwrap().is_none());

        let mut with_key = config();
        with_key.service_role_key = Some("service".to_string());
        assert!(GoTrueAdmin::new(&with_key).unwrap().is_some());
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let user = r#"{"id":"6f1b1e2a-7a59-4c59-9a55-0d6a3c1d2b3e","email":"jane@example.com",
            "user_metadata":{"username":"jane-doe"},"identities":[{"provider":"email"}]}"#;
        let session = format!(
            r#"{{"access_token":"at","refresh_token":"rt","expires_in":3600,"user":{user}}}"#
        );

        let SignUpResponse::User(bare) = serde_json::from_str(user).unwrap() else {
            panic!("expected bare user");
        };
        let account: Account = bare.into();
        assert_eq!(account.metadata_str("username"), Some("jane-doe"));
        assert_eq!(account.identities, Some(vec!["email".to_string()]));

        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(&session).unwrap(),
            SignUpResponse::Session(_)
        ));
    }

    #[test]
    fn test_obfuscated_duplicate_has_no_identities() {
        let user = r#"{"id":"6f1b1e2a-7a59-4c59-9a55-0d6a3c1d2b3e","email":"jane@example.com",
            "identities":[]}"#;

        let account: Account = serde_json::from_str::<WireUser>(user).unwrap().into();

        assert!(account.is_masked_duplicate());
    }

    #[test]
    fn test_user_without_identities_field_is_not_a_duplicate() {
        let user = r#"{"id":"6f1b1e2a-7a59-4c59-9a55-0d6a3c1d2b3e","email":"jane@example.com",
            "user_metadata":{"username":"jane-doe"}}"#;

        let account: Account = serde_json::from_str::<WireUser>(user).unwrap().into();

        assert_eq!(account.identities, None);
        assert!(!account.is_masked_duplicate());
    }

    #[test]
    fn test_error_message_precedence() {
        let body: WireError =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .unwrap();
        assert_eq!(
            body.into_message(StatusCode::BAD_REQUEST),
            "Invalid login credentials"
        );

        assert_eq!(
            WireError::default().into_message(StatusCode::BAD_REQUEST),
            "Bad Request"
        );
    }
}
