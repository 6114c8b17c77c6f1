//! Username derivation and uniqueness resolution.
//!
//! Every path that creates a profile derives its username here: a raw
//! display name is normalized into a candidate, then the [`UsernameResolver`]
//! appends random numeric suffixes until the profile store reports the
//! candidate as free.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{DomainError, RepoError};
use crate::ports::ProfileRepository;

/// Substituted when no display name is available.
pub const FALLBACK_USERNAME: &str = "user";

/// Inclusive range of the numeric collision suffix.
pub const SUFFIX_MIN: u16 = 1000;
pub const SUFFIX_MAX: u16 = 9999;

/// Length of `-NNNN`.
const SUFFIX_LEN: usize = 5;

/// Normalize a raw display name into a username candidate.
///
/// Trims, lowercases, collapses whitespace runs into `-`, drops everything
/// outside `[a-z0-9_-]` and truncates to `max_len`. The result may be empty.
pub fn normalize(raw: Option<&str>, max_len: usize) -> String {
    let raw = raw.unwrap_or(FALLBACK_USERNAME);

    let mut normalized = String::with_capacity(raw.len());
    let mut in_whitespace = false;
    for ch in raw.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                normalized.push('-');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_' {
            normalized.push(ch);
        }
    }

    // Only ASCII survives the filter, so byte truncation is char-safe.
    normalized.truncate(max_len);
    normalized
}

/// Length bound and retry ceiling shared by all username paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsernamePolicy {
    /// Maximum length of a stored username, suffix included.
    pub max_len: usize,
    /// Maximum number of availability lookups per resolution.
    pub max_attempts: u32,
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self {
            max_len: 30,
            max_attempts: 20,
        }
    }
}

impl UsernamePolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_len: std::env::var("USERNAME_MAX_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|len: &usize| *len > SUFFIX_LEN)
                .unwrap_or(defaults.max_len),
            max_attempts: std::env::var("USERNAME_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|attempts: &u32| *attempts > 0)
                .unwrap_or(defaults.max_attempts),
        }
    }

    /// Candidate for a username chosen explicitly at sign-up (never suffixed).
    pub fn sign_up_candidate(&self, raw: &str) -> String {
        normalize(Some(raw), self.max_len)
    }

    /// Base for resolution, short enough that `base-NNNN` fits `max_len`.
    pub fn provisioning_base(&self, raw: Option<&str>) -> String {
        let base = normalize(raw, self.max_len.saturating_sub(SUFFIX_LEN));
        if base.is_empty() {
            FALLBACK_USERNAME.to_string()
        } else {
            base
        }
    }
}

/// Availability check used by the resolver.
#[async_trait]
pub trait UsernameLookup: Send + Sync {
    async fn is_taken(&self, candidate: &str) -> Result<bool, RepoError>;
}

#[async_trait]
impl<T> UsernameLookup for T
where
    T: ProfileRepository + ?Sized,
{
    async fn is_taken(&self, candidate: &str) -> Result<bool, RepoError> {
        self.username_exists(candidate).await
    }
}

/// Source of collision suffixes.
pub type SuffixSource = Arc<dyn Fn() -> u16 + Send + Sync>;

fn random_suffix() -> u16 {
    rand::thread_rng().gen_range(SUFFIX_MIN..=SUFFIX_MAX)
}

/// Finds a free username for a normalized base candidate.
///
/// The lookup and the later insert are separate round-trips; the store's
/// uniqueness constraint is what finally arbitrates concurrent resolutions.
#[derive(Clone)]
pub struct UsernameResolver {
    policy: UsernamePolicy,
    suffix: SuffixSource,
}

impl UsernameResolver {
    pub fn new(policy: UsernamePolicy) -> Self {
        Self {
            policy,
            suffix: Arc::new(random_suffix),
        }
    }

    /// Replace the random suffix generator.
    pub fn with_suffix_source(mut self, suffix: SuffixSource) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn policy(&self) -> &UsernamePolicy {
        &self.policy
    }

    /// Return `base` if free, otherwise the first free `base-NNNN`.
    pub async fn resolve<L>(&self, base: &str, lookup: &L) -> Result<String, DomainError>
    where
        L: UsernameLookup + ?Sized,
    {
        let mut candidate = base.to_string();

        for attempt in 1..=self.policy.max_attempts {
            if !lookup.is_taken(&candidate).await? {
                tracing::debug!(username = %candidate, attempt, "Resolved username");
                return Ok(candidate);
            }
            candidate = format!("{}-{}", base, (self.suffix)());
        }

        tracing::warn!(base, attempts = self.policy.max_attempts, "Username resolution exhausted");
        Err(DomainError::ResolutionExhausted {
            base: base.to_string(),
            attempts: self.policy.max_attempts,
        })
    }
}

impl std::fmt::Debug for UsernameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernameResolver")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
