use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewPost, NewProfile, Post, PostChanges, Profile};
use crate::error::RepoError;

/// Profile store (`user_profiles`).
///
/// Implementations must enforce `UNIQUE(user_id)` and `UNIQUE(username)` and
/// report violations as [`RepoError::Constraint`].
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, RepoError>;

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError>;

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError>;

    async fn insert(&self, profile: NewProfile) -> Result<Profile, RepoError>;

    /// Delete the profile rows carrying `email`, returning how many went.
    async fn delete_by_email(&self, email: &str) -> Result<u64, RepoError>;
}

/// Post store (`posts`).
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<Post, RepoError>;

    /// All posts, newest first.
    async fn list_recent(&self) -> Result<Vec<Post>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError>;

    /// Update the post only if it is owned by `profile_id`; returns affected rows.
    async fn update_owned(
        &self,
        id: i64,
        profile_id: Uuid,
        changes: PostChanges,
    ) -> Result<u64, RepoError>;

    /// Delete the post only if it is owned by `profile_id`; returns affected rows.
    async fn delete_owned(&self, id: i64, profile_id: Uuid) -> Result<u64, RepoError>;
}
