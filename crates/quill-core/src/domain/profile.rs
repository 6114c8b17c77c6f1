use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile entity - extends an account with a unique username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

/// Values for a profile row; the store generates the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}
