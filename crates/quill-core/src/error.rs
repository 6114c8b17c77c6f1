//! Domain-level error types.

use thiserror::Error;

/// Domain errors - business logic failures.
///
/// Every account and post operation reports one of these instead of
/// panicking; the HTTP layer maps them onto problem responses.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("User with this email already exists")]
    AlreadyRegistered,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid or expired code: {0}")]
    InvalidCode(String),

    #[error("Credential update rejected: {0}")]
    Update(String),

    #[error("Profile not found")]
    ProfileNotFound,

    #[error("Profile creation failed: {0}")]
    ProfileCreation(String),

    #[error("Profile deletion failed: {0}")]
    ProfileDeletion(String),

    #[error("Account deletion failed: {0}")]
    AccountDeletion(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No free username derived from '{base}' after {attempts} attempts")]
    ResolutionExhausted { base: String, attempts: u32 },

    #[error("Post {0} not found")]
    PostNotFound(i64),

    #[error("Post {0} belongs to another profile")]
    Forbidden(i64),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl RepoError {
    /// Whether the store rejected the write on a uniqueness constraint.
    pub fn is_constraint(&self) -> bool {
        matches!(self, RepoError::Constraint(_))
    }
}
