//! In-memory repositories - used when no database is configured, and in tests.
//!
//! They enforce the same uniqueness constraints as the PostgreSQL schema.
//! Note: Data is lost on process restart.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{NewPost, NewProfile, Post, PostChanges, Profile};
use quill_core::error::RepoError;
use quill_core::ports::{PostRepository, ProfileRepository};

/// In-memory `user_profiles`.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    rows: RwLock<Vec<Profile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|p| p.email == email).cloned())
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().any(|p| p.username == username))
    }

    async fn insert(&self, new_profile: NewProfile) -> Result<Profile, RepoError> {
        // Check and insert under one write lock, like a unique index would.
        let mut rows = self.rows.write().await;

        if rows.iter().any(|p| p.user_id == new_profile.user_id) {
            return Err(RepoError::Constraint(
                "user_profiles_user_id_key".to_string(),
            ));
        }
        if rows.iter().any(|p| p.username == new_profile.username) {
            return Err(RepoError::Constraint(
                "user_profiles_username_key".to_string(),
            ));
        }

        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: new_profile.user_id,
            email: new_profile.email,
            username: new_profile.username,
        };
        rows.push(profile.clone());
        Ok(profile)
    }

    async fn delete_by_email(&self, email: &str) -> Result<u64, RepoError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|p| p.email != email);
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory `posts`.
pub struct InMemoryPostRepository {
    rows: RwLock<Vec<Post>>,
    next_id: AtomicI64,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn insert(&self, new_post: NewPost) -> Result<Post, RepoError> {
        let post = Post {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            title: new_post.title,
            content: new_post.content,
            profile_id: new_post.profile_id,
            created_at: chrono::Utc::now(),
        };
        self.rows.write().await.push(post.clone());
        Ok(post)
    }

    async fn list_recent(&self) -> Result<Vec<Post>, RepoError> {
        let mut posts = self.rows.read().await.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|p| p.id == id).cloned())
    }

    async fn update_owned(
        &self,
        id: i64,
        profile_id: Uuid,
        changes: PostChanges,
    ) -> Result<u64, RepoError> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|p| p.id == id && p.profile_id == profile_id)
        {
            Some(post) => {
                post.title = changes.title;
                post.content = changes.content;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_owned(&self, id: i64, profile_id: Uuid) -> Result<u64, RepoError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|p| !(p.id == id && p.profile_id == profile_id));
        Ok((before - rows.len()) as u64)
    }
}
