//! Response envelopes: `ApiResponse` for success, Problem Details for errors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// Problem Details body (RFC 7807) with a stable `code` for clients to branch on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub status: u16,
    /// Machine-readable reason, e.g. `username_taken`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        502 => "Bad Gateway",
        _ => "Internal Server Error",
    }
}

impl ErrorResponse {
    /// Bare problem for `status`; the title is the standard reason phrase.
    pub fn status(status: u16) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: reason_phrase(status).to_string(),
            status,
            code: None,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::status(400).with_detail(detail)
    }

    pub fn unauthorized() -> Self {
        Self::status(401)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::status(403).with_detail(detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::status(404).with_detail(detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::status(409).with_detail(detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::status(422).with_detail(detail)
    }

    pub fn too_many_requests() -> Self {
        Self::status(429)
    }

    /// Details of internal failures stay in the logs.
    pub fn internal_error() -> Self {
        Self::status(500)
    }

    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        Self::status(502).with_detail(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_details_shape() {
        let body = ErrorResponse::conflict("Username 'jane' is already taken")
            .with_code("username_taken");

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["type"], "about:blank");
        assert_eq!(json["title"], "Conflict");
        assert_eq!(json["status"], 409);
        assert_eq!(json["code"], "username_taken");
    }

    #[test]
    fn test_internal_error_has_no_detail() {
        let json = serde_json::to_value(ErrorResponse::internal_error()).unwrap();

        assert_eq!(json["status"], 500);
        assert!(json.get("detail").is_none());
        assert!(json.get("code").is_none());
    }

    #[test]
    fn test_api_response_omits_empty_message() {
        let json = serde_json::to_value(ApiResponse::ok(1)).unwrap();

        assert_eq!(json, serde_json::json!({ "success": true, "data": 1 }));
    }
}
