//! OAuth callback: the provider sends the browser back here with a one-time
//! code. Every outcome is a redirect.

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use serde::Deserialize;

use quill_core::error::DomainError;

use super::redirect;
use crate::middleware::session::{cleared_code_verifier_cookie, code_verifier, session_cookies};
use crate::state::AppState;

const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";
const ERROR_PATH: &str = "/error";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    next: Option<String>,
}

/// `next` must stay on this site: a single leading slash, no scheme or
/// protocol-relative host. Anything else lands on `/`.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

/// Where to send the browser after a successful login.
///
/// Behind a proxy the request origin is internal, so the public host comes
/// from `X-Forwarded-Host`; locally the header is ignored.
fn redirect_target(origin: &str, forwarded_host: Option<&str>, is_local: bool, next: &str) -> String {
    match forwarded_host {
        Some(host) if !is_local && !host.is_empty() => format!("https://{host}{next}"),
        _ => format!("{origin}{next}"),
    }
}

/// Origin the request was addressed to, from the `Host` header.
fn request_origin(req: &HttpRequest, fallback: &str) -> String {
    let scheme = if req.app_config().secure() { "https" } else { "http" };
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| format!("{scheme}://{host}"))
        .unwrap_or_else(|| fallback.to_string())
}

/// GET /auth/callback?code=…&next=…
pub async fn oauth_callback(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
) -> HttpResponse {
    let origin = request_origin(&req, &state.site_url);

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        tracing::warn!("OAuth callback without code");
        return redirect(&format!("{origin}{AUTH_CODE_ERROR_PATH}"));
    };
    let verifier = code_verifier(&req);

    match state.accounts.complete_oauth(code, verifier.as_deref()).await {
        Ok(auth) => {
            let forwarded_host = req
                .headers()
                .get("x-forwarded-host")
                .and_then(|h| h.to_str().ok());
            let target = redirect_target(
                &origin,
                forwarded_host,
                state.is_local,
                safe_next(query.next.as_deref()),
            );

            let secure = !state.is_local;
            let mut response = HttpResponse::Found();
            response.insert_header((header::LOCATION, target));
            for cookie in session_cookies(&auth.session, secure) {
                response.cookie(cookie);
            }
            response.cookie(cleared_code_verifier_cookie(secure));
            response.finish()
        }
        Err(DomainError::InvalidCode(reason)) => {
            tracing::warn!(%reason, "OAuth code exchange failed");
            redirect(&format!("{origin}{AUTH_CODE_ERROR_PATH}"))
        }
        Err(e) => {
            tracing::error!(error = %e, "OAuth login could not be completed");
            redirect(&format!("{origin}{ERROR_PATH}"))
        }
    }
}
