//! Posts and the ownership guard around their mutation.

use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{NewPost, Post, PostChanges, Session};
use crate::error::DomainError;
use crate::ports::{IdentityProvider, PostRepository, ProfileRepository};

use super::session_error;

/// What an update or delete of a post owned by someone else reports.
///
/// Ownership is enforced by the write filter itself, so a foreign post is
/// never touched; the policy only decides what the caller is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignPostPolicy {
    /// Report success although nothing changed.
    #[default]
    Silent,
    /// Report the post as missing.
    NotFound,
    /// Report `Forbidden` when the post exists, `PostNotFound` otherwise.
    Forbidden,
}

impl FromStr for ForeignPostPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "not_found" | "not-found" => Ok(Self::NotFound),
            "forbidden" => Ok(Self::Forbidden),
            other => Err(format!("unknown foreign post policy '{other}'")),
        }
    }
}

/// Post operations scoped to the caller's profile.
pub struct PostService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileRepository>,
    posts: Arc<dyn PostRepository>,
    policy: ForeignPostPolicy,
}

impl PostService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileRepository>,
        posts: Arc<dyn PostRepository>,
        policy: ForeignPostPolicy,
    ) -> Self {
        Self {
            identity,
            profiles,
            posts,
            policy,
        }
    }

    /// Profile id of the caller, or `None` when signed out or not yet provisioned.
    pub async fn resolve_own_profile_id(
        &self,
        session: Option<&Session>,
    ) -> Result<Option<Uuid>, DomainError> {
        let Some(session) = session else {
            return Ok(None);
        };

        let account = match self.identity.get_user(session).await {
            Ok(account) => account,
            Err(e) if e.is_invalid_session() => return Ok(None),
            Err(e) => return Err(DomainError::Identity(e.message())),
        };

        let profile = self.profiles.find_by_user_id(account.id).await?;
        Ok(profile.map(|p| p.id))
    }

    pub async fn create_post(
        &self,
        session: &Session,
        title: &str,
        content: &str,
    ) -> Result<Post, DomainError> {
        let profile_id = self.require_profile_id(session).await?;
        let (title, content) = validated(title, content)?;

        let post = self
            .posts
            .insert(NewPost {
                title,
                content,
                profile_id,
            })
            .await?;

        tracing::info!(post_id = post.id, %profile_id, "Post created");
        Ok(post)
    }

    /// Every post, newest first. Public.
    pub async fn list_all_posts(&self) -> Result<Vec<Post>, DomainError> {
        Ok(self.posts.list_recent().await?)
    }

    pub async fn update_own_post(
        &self,
        session: &Session,
        post_id: i64,
        title: &str,
        content: &str,
    ) -> Result<(), DomainError> {
        let profile_id = self.require_profile_id(session).await?;
        let (title, content) = validated(title, content)?;

        let affected = self
            .posts
            .update_owned(post_id, profile_id, PostChanges { title, content })
            .await?;

        self.settle(post_id, profile_id, affected).await
    }

    pub async fn delete_own_post(&self, session: &Session, post_id: i64) -> Result<(), DomainError> {
        let profile_id = self.require_profile_id(session).await?;

        let affected = self.posts.delete_owned(post_id, profile_id).await?;

        self.settle(post_id, profile_id, affected).await
    }

    async fn require_profile_id(&self, session: &Session) -> Result<Uuid, DomainError> {
        let account = self
            .identity
            .get_user(session)
            .await
            .map_err(session_error)?;

        self.profiles
            .find_by_user_id(account.id)
            .await?
            .map(|p| p.id)
            .ok_or(DomainError::ProfileNotFound)
    }

    /// Decide the outcome of an ownership-filtered write.
    async fn settle(&self, post_id: i64, profile_id: Uuid, affected: u64) -> Result<(), DomainError> {
        if affected > 0 {
            tracing::debug!(post_id, %profile_id, affected, "Own post modified");
            return Ok(());
        }

        tracing::debug!(post_id, %profile_id, policy = ?self.policy, "Write matched no owned post");
        match self.policy {
            ForeignPostPolicy::Silent => Ok(()),
            ForeignPostPolicy::NotFound => Err(DomainError::PostNotFound(post_id)),
            ForeignPostPolicy::Forbidden => match self.posts.find_by_id(post_id).await? {
                Some(_) => Err(DomainError::Forbidden(post_id)),
                None => Err(DomainError::PostNotFound(post_id)),
            },
        }
    }
}

fn validated(title: &str, content: &str) -> Result<(String, String), DomainError> {
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(DomainError::Validation(
            "Title and content are required".to_string(),
        ));
    }
    Ok((title.to_string(), content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("silent".parse::<ForeignPostPolicy>(), Ok(ForeignPostPolicy::Silent));
        assert_eq!("NOT_FOUND".parse::<ForeignPostPolicy>(), Ok(ForeignPostPolicy::NotFound));
        assert_eq!("not-found".parse::<ForeignPostPolicy>(), Ok(ForeignPostPolicy::NotFound));
        assert_eq!(" forbidden ".parse::<ForeignPostPolicy>(), Ok(ForeignPostPolicy::Forbidden));
        assert!("loud".parse::<ForeignPostPolicy>().is_err());
    }

    #[test]
    fn test_validated_rejects_blank_fields() {
        assert!(matches!(validated("", "body"), Err(DomainError::Validation(_))));
        assert!(matches!(validated("title", "   "), Err(DomainError::Validation(_))));
        assert_eq!(
            validated("T", "C").unwrap(),
            ("T".to_string(), "C".to_string())
        );
    }
}
