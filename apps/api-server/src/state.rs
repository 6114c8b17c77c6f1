//! Application state - shared across all handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use quill_core::ports::{AccountAdmin, IdentityError, IdentityProvider, PostRepository, ProfileRepository};
use quill_core::services::{AccountService, PostService};
use quill_core::username::UsernameResolver;
use quill_infra::{
    DatabaseConfig, DisabledAccountAdmin, GoTrueAdmin, GoTrueClient, GoTrueConfig,
    InMemoryPostRepository, InMemoryProfileRepository,
};

#[cfg(feature = "auth")]
use quill_infra::InMemoryIdentityProvider;
#[cfg(feature = "postgres")]
use quill_infra::{PostgresPostRepository, PostgresProfileRepository};
#[cfg(feature = "rate-limit")]
use quill_core::ports::RateLimiter;
#[cfg(feature = "rate-limit")]
use quill_infra::InMemoryRateLimiter;

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Identity provider setup failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("No identity provider configured: set SUPABASE_URL or build with the `auth` feature")]
    NoIdentityProvider,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub posts: Arc<PostService>,
    /// Public origin, used when a request carries no `Host`.
    pub site_url: String,
    /// Trust `X-Forwarded-Host` only when deployed behind a proxy.
    pub is_local: bool,
    pub started_at: DateTime<Utc>,
    #[cfg(feature = "rate-limit")]
    pub auth_limiter: Arc<dyn RateLimiter>,
    /// Key throttled clients on forwarded headers set by a trusted proxy.
    #[cfg(feature = "rate-limit")]
    pub trust_forwarded_for: bool,
}

type Identity = (Arc<dyn IdentityProvider>, Arc<dyn AccountAdmin>);
type Stores = (Arc<dyn ProfileRepository>, Arc<dyn PostRepository>);

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let (identity, admin) = build_identity(config.identity.as_ref())?;
        let (profiles, posts) = build_stores(config.database.as_ref()).await;

        let state = Self::assemble(config, identity, admin, profiles, posts);
        tracing::info!(
            foreign_post_policy = ?config.foreign_post_policy,
            max_username_len = config.username_policy.max_len,
            "Application state initialized"
        );
        Ok(state)
    }

    /// Wire services over explicit collaborators.
    pub fn assemble(
        config: &AppConfig,
        identity: Arc<dyn IdentityProvider>,
        admin: Arc<dyn AccountAdmin>,
        profiles: Arc<dyn ProfileRepository>,
        posts: Arc<dyn PostRepository>,
    ) -> Self {
        let accounts = AccountService::new(
            identity.clone(),
            admin,
            profiles.clone(),
            UsernameResolver::new(config.username_policy),
            config.site_url.clone(),
        );
        let posts = PostService::new(identity, profiles, posts, config.foreign_post_policy);

        Self {
            accounts: Arc::new(accounts),
            posts: Arc::new(posts),
            site_url: config.site_url.clone(),
            is_local: config.is_local(),
            started_at: Utc::now(),
            #[cfg(feature = "rate-limit")]
            auth_limiter: Arc::new(InMemoryRateLimiter::new(config.auth_rate_limit.clone())),
            #[cfg(feature = "rate-limit")]
            trust_forwarded_for: config.auth_rate_limit.trust_forwarded_for,
        }
    }

    /// Self-contained state over in-memory collaborators.
    #[cfg(all(test, feature = "auth"))]
    pub fn in_memory(config: &AppConfig) -> (Self, Arc<InMemoryIdentityProvider>) {
        let identity = Arc::new(InMemoryIdentityProvider::new());

        let state = Self::assemble(
            config,
            identity.clone(),
            identity.clone(),
            Arc::new(InMemoryProfileRepository::new()),
            Arc::new(InMemoryPostRepository::new()),
        );
        (state, identity)
    }
}

fn build_identity(config: Option<&GoTrueConfig>) -> Result<Identity, StartupError> {
    let Some(config) = config else {
        return fallback_identity();
    };

    let client: Arc<dyn IdentityProvider> = Arc::new(GoTrueClient::new(config)?);
    let admin: Arc<dyn AccountAdmin> = match GoTrueAdmin::new(config)? {
        Some(admin) => Arc::new(admin),
        None => {
            tracing::warn!(
                "SUPABASE_SERVICE_ROLE_KEY not set. Account deletion will fail after profile removal."
            );
            Arc::new(DisabledAccountAdmin)
        }
    };
    tracing::info!(url = %config.base_url, "Using hosted identity provider");
    Ok((client, admin))
}

#[cfg(feature = "auth")]
fn fallback_identity() -> Result<Identity, StartupError> {
    tracing::warn!(
        "SUPABASE_URL not set. Using in-process identity provider (accounts are not persisted)."
    );
    let provider = Arc::new(InMemoryIdentityProvider::new());
    let identity: Arc<dyn IdentityProvider> = provider.clone();
    let admin: Arc<dyn AccountAdmin> = provider;
    Ok((identity, admin))
}

#[cfg(not(feature = "auth"))]
fn fallback_identity() -> Result<Identity, StartupError> {
    Err(StartupError::NoIdentityProvider)
}

async fn build_stores(config: Option<&DatabaseConfig>) -> Stores {
    let Some(config) = config else {
        tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
        return in_memory_stores();
    };

    match connect_stores(config).await {
        Some(stores) => stores,
        None => in_memory_stores(),
    }
}

#[cfg(feature = "postgres")]
async fn connect_stores(config: &DatabaseConfig) -> Option<Stores> {
    match quill_infra::database::connect(config).await {
        Ok(db) => {
            let profiles: Arc<dyn ProfileRepository> =
                Arc::new(PostgresProfileRepository::new(db.clone()));
            let posts: Arc<dyn PostRepository> = Arc::new(PostgresPostRepository::new(db));
            Some((profiles, posts))
        }
        Err(e) => {
            tracing::error!(error = %e, "Database unreachable; using in-memory repositories");
            None
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn connect_stores(_config: &DatabaseConfig) -> Option<Stores> {
    tracing::info!("Running without postgres feature - using in-memory repositories");
    None
}

fn in_memory_stores() -> Stores {
    let profiles: Arc<dyn ProfileRepository> = Arc::new(InMemoryProfileRepository::new());
    let posts: Arc<dyn PostRepository> = Arc::new(InMemoryPostRepository::new());
    (profiles, posts)
}
