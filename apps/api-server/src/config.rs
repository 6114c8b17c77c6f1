//! Application configuration loaded from environment variables.

use std::env;

use quill_core::services::ForeignPostPolicy;
use quill_core::username::UsernamePolicy;
use quill_infra::{DatabaseConfig, GoTrueConfig};

#[cfg(feature = "rate-limit")]
use quill_infra::RateLimitConfig;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    /// `development` or `local`: requests reach the server directly.
    Local,
    /// Anything else: the server sits behind a proxy.
    Deployed,
}

impl RuntimeEnv {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" | "local" => RuntimeEnv::Local,
            _ => RuntimeEnv::Deployed,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub runtime_env: RuntimeEnv,
    /// Public origin used to build email and OAuth redirect targets.
    pub site_url: String,
    pub database: Option<DatabaseConfig>,
    pub identity: Option<GoTrueConfig>,
    pub username_policy: UsernamePolicy,
    pub foreign_post_policy: ForeignPostPolicy,
    #[cfg(feature = "rate-limit")]
    pub auth_rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));

        let foreign_post_policy = match env::var("FOREIGN_POST_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to silent foreign post policy");
                ForeignPostPolicy::default()
            }),
            Err(_) => ForeignPostPolicy::default(),
        };

        Self {
            runtime_env: RuntimeEnv::parse(
                &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            ),
            site_url: site_url.trim_end_matches('/').to_string(),
            database: DatabaseConfig::from_env(),
            identity: GoTrueConfig::from_env(),
            username_policy: UsernamePolicy::from_env(),
            foreign_post_policy,
            #[cfg(feature = "rate-limit")]
            auth_rate_limit: RateLimitConfig::from_env(),
            host,
            port,
        }
    }

    pub fn is_local(&self) -> bool {
        self.runtime_env == RuntimeEnv::Local
    }
}
