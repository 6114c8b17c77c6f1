//! Account lifecycle scenarios against the in-memory adapters.
#![cfg(feature = "auth")]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use quill_core::DomainError;
use quill_core::domain::{Account, AuthSession, NewProfile, Profile, Session};
use quill_core::error::RepoError;
use quill_core::ports::{AccountAdmin, IdentityError, IdentityProvider, ProfileRepository};
use quill_core::services::{AccountService, ForeignPostPolicy, PostService};
use quill_core::username::{SUFFIX_MAX, SUFFIX_MIN, UsernamePolicy, UsernameResolver};
use quill_infra::{InMemoryIdentityProvider, InMemoryPostRepository, InMemoryProfileRepository};

const SITE_URL: &str = "http://localhost:8080";

struct Harness {
    identity: Arc<InMemoryIdentityProvider>,
    profiles: Arc<InMemoryProfileRepository>,
    accounts: AccountService,
}

fn harness_with_admin(admin: Option<Arc<dyn AccountAdmin>>) -> Harness {
    let identity = Arc::new(InMemoryIdentityProvider::new());
    let profiles = Arc::new(InMemoryProfileRepository::new());
    let admin = admin.unwrap_or_else(|| identity.clone() as Arc<dyn AccountAdmin>);
    let accounts = AccountService::new(
        identity.clone(),
        admin,
        profiles.clone(),
        UsernameResolver::new(UsernamePolicy::default()),
        SITE_URL,
    );
    Harness {
        identity,
        profiles,
        accounts,
    }
}

fn harness() -> Harness {
    harness_with_admin(None)
}

async fn seed_profile(profiles: &InMemoryProfileRepository, username: &str) {
    profiles
        .insert(NewProfile {
            user_id: Uuid::new_v4(),
            email: format!("{username}@other.example"),
            username: username.to_string(),
        })
        .await
        .unwrap();
}

struct FailingAdmin;

#[async_trait]
impl AccountAdmin for FailingAdmin {
    async fn delete_account(&self, _account_id: Uuid) -> Result<(), IdentityError> {
        Err(IdentityError::Transport("connection reset".into()))
    }
}

#[tokio::test]
async fn sign_up_normalizes_username_into_metadata() {
    let h = harness();

    let account = h
        .accounts
        .sign_up("Jane Doe!", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    assert_eq!(account.metadata_str("username"), Some("jane-doe"));
    // Profile creation is deferred to first sign-in.
    assert!(h.profiles.find_by_user_id(account.id).await.unwrap().is_none());
}

#[tokio::test]
async fn sign_up_with_taken_username_is_rejected_without_suffixing() {
    let h = harness();
    seed_profile(&h.profiles, "jane-doe").await;

    let err = h
        .accounts
        .sign_up("Jane Doe!", "jane@example.com", "secret-pw")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::UsernameTaken(ref name) if name == "jane-doe"));
    assert!(matches!(
        h.identity.sign_in_with_password("jane@example.com", "secret-pw").await,
        Err(IdentityError::Rejected { .. })
    ));
}

#[tokio::test]
async fn sign_up_rejects_degenerate_username() {
    let h = harness();

    let err = h
        .accounts
        .sign_up("!!!", "jane@example.com", "secret-pw")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Validation(_)));
}

#[tokio::test]
async fn sign_up_twice_reports_already_registered() {
    let h = harness();
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    let err = h
        .accounts
        .sign_up("jane2", "jane@example.com", "secret-pw")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::AlreadyRegistered));
}

#[tokio::test]
async fn sign_up_surfaces_provider_rejection() {
    let h = harness();

    let err = h
        .accounts
        .sign_up("jane", "jane@example.com", "short")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Identity(ref msg) if msg.contains("at least 6")));
}

#[tokio::test]
async fn first_sign_in_provisions_profile() {
    let h = harness();
    let account = h
        .accounts
        .sign_up("Jane Doe", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    let auth = h
        .accounts
        .sign_in("jane@example.com", "secret-pw")
        .await
        .unwrap();

    let profile = h.profiles.find_by_user_id(account.id).await.unwrap().unwrap();
    assert_eq!(auth.account.id, account.id);
    assert_eq!(profile.username, "jane-doe");
    assert_eq!(profile.email, "jane@example.com");

    // A second sign-in keeps the existing profile.
    h.accounts
        .sign_in("jane@example.com", "secret-pw")
        .await
        .unwrap();
    let again = h.profiles.find_by_user_id(account.id).await.unwrap().unwrap();
    assert_eq!(again.id, profile.id);
}

#[tokio::test]
async fn sign_in_resolves_collision_with_numeric_suffix() {
    let h = harness();
    let account = h
        .identity
        .sign_up("bob@example.com", "secret-pw", {
            let mut metadata = Map::new();
            metadata.insert("username".into(), Value::from("Bob 123"));
            metadata
        })
        .await
        .unwrap();
    seed_profile(&h.profiles, "bob-123").await;

    h.accounts
        .sign_in("bob@example.com", "secret-pw")
        .await
        .unwrap();

    let profile = h.profiles.find_by_user_id(account.id).await.unwrap().unwrap();
    let suffix: u16 = profile
        .username
        .strip_prefix("bob-123-")
        .expect("suffixed username")
        .parse()
        .unwrap();
    assert!((SUFFIX_MIN..=SUFFIX_MAX).contains(&suffix));
}

#[tokio::test]
async fn sign_in_without_metadata_falls_back_to_user() {
    let h = harness();
    let account = h
        .identity
        .sign_up("anon@example.com", "secret-pw", Map::new())
        .await
        .unwrap();

    h.accounts
        .sign_in("anon@example.com", "secret-pw")
        .await
        .unwrap();

    let profile = h.profiles.find_by_user_id(account.id).await.unwrap().unwrap();
    assert_eq!(profile.username, "user");
}

#[tokio::test]
async fn sign_in_with_bad_password_is_invalid_credentials() {
    let h = harness();
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    let err = h
        .accounts
        .sign_in("jane@example.com", "wrong-pw")
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidCredentials(ref msg) if msg == "Invalid login credentials"));
}

#[tokio::test]
async fn oauth_callback_provisions_profile_from_handle() {
    let h = harness();
    let mut metadata = Map::new();
    metadata.insert("user_name".into(), Value::from("The Octocat"));
    let code = h
        .identity
        .seed_oauth_login("github", "octo@example.com", metadata, "verifier")
        .await;

    let auth = h
        .accounts
        .complete_oauth(&code, Some("verifier"))
        .await
        .unwrap();

    let profile = h
        .profiles
        .find_by_user_id(auth.account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.username, "the-octocat");
    assert_eq!(profile.email, "octo@example.com");
}

#[tokio::test]
async fn oauth_callback_with_bad_code_is_invalid_code() {
    let h = harness();

    let err = h
        .accounts
        .complete_oauth("not-a-code", Some("verifier"))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidCode(_)));
}

#[tokio::test]
async fn password_reset_round_trip() {
    let h = harness();
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    let verifier = h
        .accounts
        .request_password_reset("jane@example.com")
        .await
        .unwrap();
    let code = h.identity.pending_code_for("jane@example.com").await.unwrap();

    h.accounts
        .reset_password(&code, Some(&verifier), "brand-new-pw")
        .await
        .unwrap();

    assert!(h.accounts.sign_in("jane@example.com", "secret-pw").await.is_err());
    assert!(h.accounts.sign_in("jane@example.com", "brand-new-pw").await.is_ok());
}

#[tokio::test]
async fn password_reset_failures() {
    let h = harness();
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    let err = h
        .accounts
        .reset_password("bogus", None, "brand-new-pw")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidCode(_)));

    let verifier = h
        .accounts
        .request_password_reset("jane@example.com")
        .await
        .unwrap();
    let code = h.identity.pending_code_for("jane@example.com").await.unwrap();
    let err = h
        .accounts
        .reset_password(&code, Some(&verifier), "tiny")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Update(_)));
}

#[tokio::test]
async fn password_reset_for_unknown_email_is_silent() {
    let h = harness();

    assert!(h
        .accounts
        .request_password_reset("nobody@example.com")
        .await
        .is_ok());
}

#[tokio::test]
async fn delete_account_removes_profile_then_account() {
    let h = harness();
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();
    let auth = h
        .accounts
        .sign_in("jane@example.com", "secret-pw")
        .await
        .unwrap();

    h.accounts.delete_account(&auth.session).await.unwrap();

    assert!(h.profiles.find_by_email("jane@example.com").await.unwrap().is_none());
    assert!(!h.identity.contains(auth.account.id).await);
}

#[tokio::test]
async fn delete_account_failure_leaves_account_without_profile() {
    let h = harness_with_admin(Some(Arc::new(FailingAdmin)));
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();
    let auth = h
        .accounts
        .sign_in("jane@example.com", "secret-pw")
        .await
        .unwrap();

    let err = h.accounts.delete_account(&auth.session).await.unwrap_err();

    assert!(matches!(err, DomainError::AccountDeletion(_)));
    assert!(h.profiles.find_by_email("jane@example.com").await.unwrap().is_none());
    assert!(h.identity.contains(auth.account.id).await);
}

#[tokio::test]
async fn delete_account_requires_session() {
    let h = harness();

    let err = h
        .accounts
        .delete_account(&Session::from_access_token("garbage"))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::NotAuthenticated));
}

#[tokio::test]
async fn sign_out_invalidates_session() {
    let h = harness();
    h.accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();
    let auth = h
        .accounts
        .sign_in("jane@example.com", "secret-pw")
        .await
        .unwrap();

    h.accounts.sign_out(&auth.session).await.unwrap();

    assert!(matches!(
        h.accounts.current_account(&auth.session).await,
        Err(DomainError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn begin_oauth_validates_provider_name() {
    let h = harness();

    assert!(matches!(
        h.accounts.begin_oauth("git hub"),
        Err(DomainError::Validation(_))
    ));
    // The in-process provider cannot federate.
    assert!(matches!(
        h.accounts.begin_oauth("github"),
        Err(DomainError::Identity(_))
    ));
}

/// Provider that is reachable for sign-up but failing everything else with a 503.
struct DegradedProvider {
    sign_up_identities: Option<Vec<String>>,
}

fn unavailable() -> IdentityError {
    IdentityError::Rejected {
        status: 503,
        message: "Service Unavailable".into(),
    }
}

#[async_trait]
impl IdentityProvider for DegradedProvider {
    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account, IdentityError> {
        Ok(Account {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            metadata,
            identities: self.sign_up_identities.clone(),
        })
    }

    async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<AuthSession, IdentityError> {
        Err(unavailable())
    }

    async fn sign_out(&self, _: &Session) -> Result<(), IdentityError> {
        Err(unavailable())
    }

    async fn reset_password_for_email(&self, _: &str, _: &str, _: &str) -> Result<(), IdentityError> {
        Err(unavailable())
    }

    async fn update_password(&self, _: &Session, _: &str) -> Result<Account, IdentityError> {
        Err(unavailable())
    }

    async fn exchange_code_for_session(
        &self,
        _: &str,
        _: Option<&str>,
    ) -> Result<AuthSession, IdentityError> {
        Err(unavailable())
    }

    async fn get_user(&self, _: &Session) -> Result<Account, IdentityError> {
        Err(unavailable())
    }

    fn authorize_url(&self, _: &str, _: &str, _: &str) -> Result<String, IdentityError> {
        Err(unavailable())
    }
}

fn degraded_accounts(sign_up_identities: Option<Vec<String>>) -> AccountService {
    let provider = Arc::new(DegradedProvider { sign_up_identities });
    AccountService::new(
        provider,
        Arc::new(FailingAdmin),
        Arc::new(InMemoryProfileRepository::new()),
        UsernameResolver::new(UsernamePolicy::default()),
        SITE_URL,
    )
}

#[tokio::test]
async fn provider_outage_is_not_reported_as_signed_out() {
    let accounts = degraded_accounts(None);
    let posts = PostService::new(
        Arc::new(DegradedProvider { sign_up_identities: None }),
        Arc::new(InMemoryProfileRepository::new()),
        Arc::new(InMemoryPostRepository::new()),
        ForeignPostPolicy::Silent,
    );
    let session = Session::from_access_token("looks-fine");

    assert!(matches!(
        accounts.current_account(&session).await,
        Err(DomainError::Identity(_))
    ));
    assert!(matches!(
        accounts.delete_account(&session).await,
        Err(DomainError::Identity(_))
    ));
    assert!(matches!(
        posts.resolve_own_profile_id(Some(&session)).await,
        Err(DomainError::Identity(_))
    ));
    assert!(matches!(
        posts.create_post(&session, "T", "C").await,
        Err(DomainError::Identity(_))
    ));
}

#[tokio::test]
async fn sign_up_response_without_identity_list_is_a_new_account() {
    let account = degraded_accounts(None)
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();
    assert_eq!(account.identities, None);

    let err = degraded_accounts(Some(Vec::new()))
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::AlreadyRegistered));
}

/// How the profile store misbehaves on `insert`.
#[derive(Clone, Copy)]
enum InsertRace {
    /// A parallel sign-in of the same account lands its row first.
    SameAccountWins,
    /// Another account claims the resolved username just before us.
    UsernameStolen,
    /// Every insert collides.
    AlwaysCollides,
    /// The store fails for reasons unrelated to uniqueness.
    Broken,
}

struct RacingProfiles {
    inner: InMemoryProfileRepository,
    race: InsertRace,
    inserts: AtomicU32,
}

impl RacingProfiles {
    fn new(race: InsertRace) -> Self {
        Self {
            inner: InMemoryProfileRepository::new(),
            race,
            inserts: AtomicU32::new(0),
        }
    }

    fn insert_calls(&self) -> u32 {
        self.inserts.load(Ordering::SeqCst)
    }
}

fn collision(constraint: &str) -> RepoError {
    RepoError::Constraint(format!(
        "duplicate key value violates unique constraint \"{constraint}\""
    ))
}

#[async_trait]
impl ProfileRepository for RacingProfiles {
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>, RepoError> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        self.inner.find_by_user_id(user_id).await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        self.inner.username_exists(username).await
    }

    async fn insert(&self, profile: NewProfile) -> Result<Profile, RepoError> {
        let first = self.inserts.fetch_add(1, Ordering::SeqCst) == 0;

        match self.race {
            InsertRace::SameAccountWins if first => {
                self.inner
                    .insert(NewProfile {
                        username: "jane-elsewhere".into(),
                        ..profile
                    })
                    .await?;
                Err(collision("user_profiles_user_id_key"))
            }
            InsertRace::UsernameStolen if first => {
                self.inner
                    .insert(NewProfile {
                        user_id: Uuid::new_v4(),
                        email: "thief@example.com".into(),
                        username: profile.username,
                    })
                    .await?;
                Err(collision("user_profiles_username_key"))
            }
            InsertRace::AlwaysCollides => Err(collision("user_profiles_username_key")),
            InsertRace::Broken => Err(RepoError::Query("relation does not exist".into())),
            _ => self.inner.insert(profile).await,
        }
    }

    async fn delete_by_email(&self, email: &str) -> Result<u64, RepoError> {
        self.inner.delete_by_email(email).await
    }
}

/// Register `jane`, then sign in against a racing profile store.
async fn sign_in_racing(
    race: InsertRace,
) -> (Result<AuthSession, DomainError>, Arc<RacingProfiles>) {
    let identity = Arc::new(InMemoryIdentityProvider::new());
    let profiles = Arc::new(RacingProfiles::new(race));
    let accounts = AccountService::new(
        identity.clone(),
        identity,
        profiles.clone(),
        UsernameResolver::new(UsernamePolicy::default()),
        SITE_URL,
    );
    accounts
        .sign_up("jane", "jane@example.com", "secret-pw")
        .await
        .unwrap();

    let result = accounts.sign_in("jane@example.com", "secret-pw").await;
    (result, profiles)
}

#[tokio::test]
async fn provisioning_adopts_profile_created_concurrently_for_same_account() {
    let (result, profiles) = sign_in_racing(InsertRace::SameAccountWins).await;
    let auth = result.unwrap();

    let profile = profiles.find_by_user_id(auth.account.id).await.unwrap().unwrap();
    assert_eq!(profile.username, "jane-elsewhere");
    assert_eq!(profiles.insert_calls(), 1);
}

#[tokio::test]
async fn provisioning_resolves_again_when_username_is_stolen() {
    let (result, profiles) = sign_in_racing(InsertRace::UsernameStolen).await;
    let auth = result.unwrap();

    let profile = profiles.find_by_user_id(auth.account.id).await.unwrap().unwrap();
    let suffix: u16 = profile
        .username
        .strip_prefix("jane-")
        .and_then(|s| s.parse().ok())
        .expect("suffixed username");
    assert!((SUFFIX_MIN..=SUFFIX_MAX).contains(&suffix));
    assert_eq!(profiles.insert_calls(), 2);
}

#[tokio::test]
async fn provisioning_gives_up_after_three_collisions() {
    let (result, profiles) = sign_in_racing(InsertRace::AlwaysCollides).await;

    assert!(matches!(result, Err(DomainError::ProfileCreation(_))));
    assert_eq!(profiles.insert_calls(), 3);
}

#[tokio::test]
async fn provisioning_store_failure_is_profile_creation_error() {
    let (result, profiles) = sign_in_racing(InsertRace::Broken).await;

    assert!(matches!(result, Err(DomainError::ProfileCreation(_))));
    assert_eq!(profiles.insert_calls(), 1);
}
