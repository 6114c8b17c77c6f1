use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key holding the username chosen at password sign-up.
pub const SIGN_UP_USERNAME_KEY: &str = "username";

/// Metadata key holding the handle supplied by an OAuth provider.
pub const OAUTH_HANDLE_KEY: &str = "user_name";

/// Account entity - the credential record owned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: Option<String>,
    /// Free-form metadata attached at sign-up or by the OAuth provider.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Providers linked to this account (`email`, `github`, ...).
    /// `None` when the provider response did not list them.
    #[serde(default)]
    pub identities: Option<Vec<String>>,
}

impl Account {
    /// Read a string value from the account metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// An explicitly empty identity list is how the provider answers a
    /// sign-up for an email that is already registered.
    pub fn is_masked_duplicate(&self) -> bool {
        matches!(self.identities.as_deref(), Some([]))
    }

    /// Email address, or an empty string for accounts without one.
    pub fn email_or_empty(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }
}
