//! HS256 session tokens.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session token configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_secs: i64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: Uuid::new_v4().to_string(),
            expiration_secs: 3600,
            issuer: "quill-dev-identity".to_string(),
        }
    }
}

/// Clock skew tolerated when checking `exp`.
pub const EXPIRY_LEEWAY_SECS: u64 = 60;

/// What a valid token tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub account_id: Uuid,
    /// Unique per token; the handle used to revoke it.
    pub token_id: String,
    /// `exp` claim, seconds since the epoch.
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // account id
    email: String,
    exp: i64,
    iat: i64,
    iss: String,
    jti: String, // lets a single token be revoked
}

/// Issues and validates session access tokens.
pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: JwtConfig,
}

impl JwtSessionIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            config,
        }
    }

    /// Sign a token for `account_id`.
    pub fn issue(&self, account_id: Uuid, email: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            exp: (now + TimeDelta::seconds(self.config.expiration_secs)).timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Validate a token's signature, issuer and expiry.
    pub fn validate(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = EXPIRY_LEEWAY_SECS;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        Ok(VerifiedToken {
            account_id: Uuid::parse_str(&data.claims.sub)
                .map_err(|e| TokenError::Invalid(e.to_string()))?,
            token_id: data.claims.jti,
            expires_at: data.claims.exp,
        })
    }

    pub fn expiration_secs(&self) -> u64 {
        self.config.expiration_secs.max(0) as u64
    }
}
