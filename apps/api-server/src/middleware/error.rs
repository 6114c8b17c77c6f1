//! Error handling middleware - RFC 7807 compliant responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use quill_core::error::{DomainError, RepoError};
use quill_shared::ErrorResponse;
use std::fmt;

/// Application-level error type that converts to RFC 7807 responses.
///
/// Every variant carries a stable machine-readable `code` next to the
/// human-readable detail.
#[derive(Debug)]
pub enum AppError {
    BadRequest { code: &'static str, detail: String },
    Unauthorized { code: &'static str, detail: String },
    Forbidden(String),
    NotFound { code: &'static str, detail: String },
    Conflict { code: &'static str, detail: String },
    Unprocessable { code: &'static str, detail: String },
    Internal { code: &'static str, detail: String },
    BadGateway { code: &'static str, detail: String },
}

impl AppError {
    pub fn bad_request(code: &'static str, detail: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            detail: detail.into(),
        }
    }

    pub fn not_authenticated() -> Self {
        AppError::Unauthorized {
            code: "not_authenticated",
            detail: "Sign in to continue".to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Forbidden(_) => "forbidden",
            AppError::BadRequest { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Unprocessable { code, .. }
            | AppError::Internal { code, .. }
            | AppError::BadGateway { code, .. } => *code,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest { detail, .. } => write!(f, "Bad request: {}", detail),
            AppError::Unauthorized { detail, .. } => write!(f, "Unauthorized: {}", detail),
            AppError::Forbidden(detail) => write!(f, "Forbidden: {}", detail),
            AppError::NotFound { detail, .. } => write!(f, "Not found: {}", detail),
            AppError::Conflict { detail, .. } => write!(f, "Conflict: {}", detail),
            AppError::Unprocessable { detail, .. } => write!(f, "Unprocessable: {}", detail),
            AppError::Internal { detail, .. } => write!(f, "Internal error: {}", detail),
            AppError::BadGateway { detail, .. } => write!(f, "Upstream error: {}", detail),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            AppError::BadRequest { detail, .. } => ErrorResponse::bad_request(detail),
            AppError::Unauthorized { detail, .. } => {
                ErrorResponse::unauthorized().with_detail(detail)
            }
            AppError::Forbidden(detail) => ErrorResponse::forbidden(detail),
            AppError::NotFound { detail, .. } => ErrorResponse::not_found(detail),
            AppError::Conflict { detail, .. } => ErrorResponse::conflict(detail),
            AppError::Unprocessable { detail, .. } => ErrorResponse::unprocessable(detail),
            AppError::Internal { detail, .. } => {
                // Log internal errors, never leak them
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
            AppError::BadGateway { detail, .. } => {
                tracing::error!("Upstream error: {}", detail);
                ErrorResponse::bad_gateway(detail)
            }
        };

        HttpResponse::build(self.status_code()).json(error.with_code(self.code()))
    }
}

// Conversion from domain errors
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(detail) => AppError::bad_request("validation_error", detail),
            DomainError::UsernameTaken(username) => AppError::Conflict {
                code: "username_taken",
                detail: format!("Username '{}' is already taken", username),
            },
            DomainError::AlreadyRegistered => AppError::Conflict {
                code: "already_registered",
                detail: "User with this email already exists".to_string(),
            },
            DomainError::Identity(detail) => AppError::bad_request("identity_error", detail),
            DomainError::InvalidCredentials(detail) => AppError::Unauthorized {
                code: "invalid_credentials",
                detail,
            },
            DomainError::InvalidCode(detail) => AppError::bad_request("invalid_code", detail),
            DomainError::Update(detail) => AppError::Unprocessable {
                code: "update_rejected",
                detail,
            },
            DomainError::ProfileNotFound => AppError::NotFound {
                code: "profile_not_found",
                detail: "No profile exists for this account".to_string(),
            },
            DomainError::ProfileCreation(detail) => AppError::Internal {
                code: "profile_creation_failed",
                detail,
            },
            DomainError::ProfileDeletion(detail) => AppError::Internal {
                code: "profile_deletion_failed",
                detail,
            },
            DomainError::AccountDeletion(detail) => AppError::BadGateway {
                code: "account_deletion_failed",
                detail,
            },
            DomainError::NotAuthenticated => AppError::not_authenticated(),
            err @ DomainError::ResolutionExhausted { .. } => AppError::Conflict {
                code: "username_unavailable",
                detail: err.to_string(),
            },
            DomainError::PostNotFound(id) => AppError::NotFound {
                code: "post_not_found",
                detail: format!("Post {} not found", id),
            },
            DomainError::Forbidden(id) => {
                AppError::Forbidden(format!("Post {} belongs to another profile", id))
            }
            DomainError::Repository(err) => err.into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound {
                code: "not_found",
                detail: "Resource not found".to_string(),
            },
            RepoError::Constraint(msg) => {
                tracing::warn!("Database constraint violation: {}", msg);
                AppError::Conflict {
                    code: "conflict",
                    detail: "The request conflicts with existing data".to_string(),
                }
            }
            RepoError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                AppError::Internal {
                    code: "database_error",
                    detail: "Database error".to_string(),
                }
            }
            RepoError::Query(msg) => {
                tracing::error!("Database query error: {}", msg);
                AppError::Internal {
                    code: "database_error",
                    detail: "Database error".to_string(),
                }
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_domain_error_statuses() {
        let cases = [
            (DomainError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (DomainError::UsernameTaken("jane".into()), StatusCode::CONFLICT),
            (DomainError::AlreadyRegistered, StatusCode::CONFLICT),
            (DomainError::InvalidCredentials("x".into()), StatusCode::UNAUTHORIZED),
            (DomainError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (DomainError::Update("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::ProfileNotFound, StatusCode::NOT_FOUND),
            (DomainError::PostNotFound(1), StatusCode::NOT_FOUND),
            (DomainError::Forbidden(1), StatusCode::FORBIDDEN),
            (DomainError::ProfileDeletion("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::AccountDeletion("x".into()), StatusCode::BAD_GATEWAY),
        ];

        for (domain, status) in cases {
            let label = domain.to_string();
            assert_eq!(AppError::from(domain).status_code(), status, "{label}");
        }
    }

    #[actix_web::test]
    async fn test_problem_body_carries_code() {
        let response = AppError::from(DomainError::UsernameTaken("jane-doe".into())).error_response();

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], 409);
        assert_eq!(json["code"], "username_taken");
        assert_eq!(json["detail"], "Username 'jane-doe' is already taken");
    }

    #[actix_web::test]
    async fn test_internal_detail_is_not_leaked() {
        let response = AppError::from(RepoError::Query("relation missing".into())).error_response();

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["code"], "database_error");
        assert!(json.get("detail").is_none());
    }

    #[actix_web::test]
    async fn test_constraint_detail_is_not_leaked() {
        let raw = r#"duplicate key value violates unique constraint "user_profiles_username_key""#;
        let response = AppError::from(RepoError::Constraint(raw.into())).error_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["code"], "conflict");
        assert_eq!(json["detail"], "The request conflicts with existing data");
        assert!(!String::from_utf8_lossy(&body).contains("user_profiles"));
    }
}
