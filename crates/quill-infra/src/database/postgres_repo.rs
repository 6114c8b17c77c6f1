//! PostgreSQL repository implementations.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use quill_core::domain::{NewPost, NewProfile, Post, PostChanges, Profile};
use quill_core::error::RepoError;
use quill_core::ports::{PostRepository, ProfileRepository};

use super::entity::post::{self, Entity as PostEntity};
use super::entity::profile::{self, Entity as ProfileEntity};
use super::postgres_base::{PostgresBaseRepository, query_error, write_error};

/// PostgreSQL profile repository.
pub type PostgresProfileRepository = PostgresBaseRepository<ProfileEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, RepoError> {
        let result = ProfileEntity::find()
            .filter(profile::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        let result = ProfileEntity::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let result = ProfileEntity::find()
            .filter(profile::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.is_some())
    }

    async fn insert(&self, new_profile: NewProfile) -> Result<Profile, RepoError> {
        let model = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new_profile.user_id),
            email: Set(new_profile.email),
            username: Set(new_profile.username),
        }
        .insert(&self.db)
        .await
        .map_err(write_error)?;

        Ok(model.into())
    }

    async fn delete_by_email(&self, email: &str) -> Result<u64, RepoError> {
        let result = ProfileEntity::delete_many()
            .filter(profile::Column::Email.eq(email))
            .exec(&self.db)
            .await
            .map_err(write_error)?;

        Ok(result.rows_affected)
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn insert(&self, new_post: NewPost) -> Result<Post, RepoError> {
        let model = post::ActiveModel {
            id: NotSet,
            title: Set(new_post.title),
            content: Set(new_post.content),
            profile_id: Set(new_post.profile_id),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(write_error)?;

        Ok(model.into())
    }

    async fn list_recent(&self) -> Result<Vec<Post>, RepoError> {
        let result = PostEntity::find()
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn update_owned(
        &self,
        id: i64,
        profile_id: Uuid,
        changes: PostChanges,
    ) -> Result<u64, RepoError> {
        let result = PostEntity::update_many()
            .col_expr(post::Column::Title, Expr::value(changes.title))
            .col_expr(post::Column::Content, Expr::value(changes.content))
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::ProfileId.eq(profile_id))
            .exec(&self.db)
            .await
            .map_err(write_error)?;

        Ok(result.rows_affected)
    }

    async fn delete_owned(&self, id: i64, profile_id: Uuid) -> Result<u64, RepoError> {
        let result = PostEntity::delete_many()
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::ProfileId.eq(profile_id))
            .exec(&self.db)
            .await
            .map_err(write_error)?;

        Ok(result.rows_affected)
    }
}
