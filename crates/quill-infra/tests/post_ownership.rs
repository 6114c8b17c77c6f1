//! Post ownership scenarios against the in-memory adapters.
#![cfg(feature = "auth")]

use std::sync::Arc;

use quill_core::DomainError;
use quill_core::domain::Session;
use quill_core::ports::{PostRepository, ProfileRepository};
use quill_core::services::{AccountService, ForeignPostPolicy, PostService};
use quill_core::username::{UsernamePolicy, UsernameResolver};
use quill_infra::{InMemoryIdentityProvider, InMemoryPostRepository, InMemoryProfileRepository};

struct Blog {
    accounts: AccountService,
    posts: PostService,
    profiles: Arc<InMemoryProfileRepository>,
    store: Arc<InMemoryPostRepository>,
}

fn blog(policy: ForeignPostPolicy) -> Blog {
    let identity = Arc::new(InMemoryIdentityProvider::new());
    let profiles = Arc::new(InMemoryProfileRepository::new());
    let store = Arc::new(InMemoryPostRepository::new());

    Blog {
        accounts: AccountService::new(
            identity.clone(),
            identity.clone(),
            profiles.clone(),
            UsernameResolver::new(UsernamePolicy::default()),
            "http://localhost:8080",
        ),
        posts: PostService::new(identity, profiles.clone(), store.clone(), policy),
        profiles,
        store,
    }
}

async fn signed_in(blog: &Blog, name: &str) -> Session {
    let email = format!("{name}@example.com");
    blog.accounts
        .sign_up(name, &email, "secret-pw")
        .await
        .unwrap();
    blog.accounts
        .sign_in(&email, "secret-pw")
        .await
        .unwrap()
        .session
}

#[tokio::test]
async fn own_profile_id_is_none_when_signed_out() {
    let blog = blog(ForeignPostPolicy::Silent);

    assert_eq!(blog.posts.resolve_own_profile_id(None).await.unwrap(), None);
    assert_eq!(
        blog.posts
            .resolve_own_profile_id(Some(&Session::from_access_token("stale")))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn created_post_belongs_to_caller() {
    let blog = blog(ForeignPostPolicy::Silent);
    let alice = signed_in(&blog, "alice").await;

    let post = blog
        .posts
        .create_post(&alice, "Hello", "First post")
        .await
        .unwrap();

    let own = blog.posts.resolve_own_profile_id(Some(&alice)).await.unwrap();
    assert_eq!(own, Some(post.profile_id));

    let listed = blog.posts.list_all_posts().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Hello");
}

#[tokio::test]
async fn create_requires_session_and_fields() {
    let blog = blog(ForeignPostPolicy::Silent);
    let alice = signed_in(&blog, "alice").await;

    assert!(matches!(
        blog.posts
            .create_post(&Session::from_access_token("stale"), "T", "C")
            .await,
        Err(DomainError::NotAuthenticated)
    ));
    assert!(matches!(
        blog.posts.create_post(&alice, " ", "C").await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn owner_can_update_and_delete() {
    let blog = blog(ForeignPostPolicy::Silent);
    let alice = signed_in(&blog, "alice").await;
    let post = blog.posts.create_post(&alice, "T", "C").await.unwrap();

    blog.posts
        .update_own_post(&alice, post.id, "T2", "C2")
        .await
        .unwrap();
    let updated = blog.store.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!((updated.title.as_str(), updated.content.as_str()), ("T2", "C2"));

    blog.posts.delete_own_post(&alice, post.id).await.unwrap();
    assert!(blog.store.find_by_id(post.id).await.unwrap().is_none());
}

#[tokio::test]
async fn foreign_writes_are_silent_no_ops_by_default() {
    let blog = blog(ForeignPostPolicy::Silent);
    let alice = signed_in(&blog, "alice").await;
    let mallory = signed_in(&blog, "mallory").await;
    let post = blog
        .posts
        .create_post(&alice, "Mine", "original")
        .await
        .unwrap();

    blog.posts
        .update_own_post(&mallory, post.id, "Pwned", "pwned")
        .await
        .unwrap();
    blog.posts.delete_own_post(&mallory, post.id).await.unwrap();

    let untouched = blog.store.find_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(untouched.title, "Mine");
    assert_eq!(untouched.content, "original");
}

#[tokio::test]
async fn not_found_policy_hides_foreign_posts() {
    let blog = blog(ForeignPostPolicy::NotFound);
    let alice = signed_in(&blog, "alice").await;
    let mallory = signed_in(&blog, "mallory").await;
    let post = blog.posts.create_post(&alice, "Mine", "original").await.unwrap();

    let err = blog
        .posts
        .update_own_post(&mallory, post.id, "Pwned", "pwned")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::PostNotFound(id) if id == post.id));
    assert_eq!(
        blog.store.find_by_id(post.id).await.unwrap().unwrap().content,
        "original"
    );
}

#[tokio::test]
async fn forbidden_policy_distinguishes_missing_from_foreign() {
    let blog = blog(ForeignPostPolicy::Forbidden);
    let alice = signed_in(&blog, "alice").await;
    let mallory = signed_in(&blog, "mallory").await;
    let post = blog.posts.create_post(&alice, "Mine", "original").await.unwrap();

    assert!(matches!(
        blog.posts.delete_own_post(&mallory, post.id).await,
        Err(DomainError::Forbidden(id)) if id == post.id
    ));
    assert!(matches!(
        blog.posts.delete_own_post(&mallory, 9_999).await,
        Err(DomainError::PostNotFound(9_999))
    ));
    assert!(blog.store.find_by_id(post.id).await.unwrap().is_some());
}

#[tokio::test]
async fn writes_without_profile_are_rejected() {
    let blog = blog(ForeignPostPolicy::Silent);
    let ghost = signed_in(&blog, "ghost").await;
    blog.profiles.delete_by_email("ghost@example.com").await.unwrap();

    assert_eq!(blog.posts.resolve_own_profile_id(Some(&ghost)).await.unwrap(), None);
    assert!(matches!(
        blog.posts.create_post(&ghost, "T", "C").await,
        Err(DomainError::ProfileNotFound)
    ));
}
