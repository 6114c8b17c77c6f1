//! Session extractors and session cookies.
//!
//! Browsers carry the provider session in HTTP-only cookies; other clients
//! may send the access token as a Bearer header instead. Extraction only
//! reads the credentials: validating them is the identity provider's job.

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header};
use std::future::{Ready, ready};

use quill_core::domain::Session;

use super::error::AppError;

pub const ACCESS_TOKEN_COOKIE: &str = "quill-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "quill-refresh-token";
/// PKCE verifier parked between starting a code flow and redeeming the code.
pub const CODE_VERIFIER_COOKIE: &str = "quill-code-verifier";

const CODE_VERIFIER_TTL_MINUTES: i64 = 60;

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn read_session(req: &HttpRequest) -> Option<Session> {
    if let Some(token) = bearer_token(req) {
        return Some(Session::from_access_token(token));
    }

    let access = req.cookie(ACCESS_TOKEN_COOKIE)?;
    if access.value().is_empty() {
        return None;
    }
    Some(Session {
        access_token: access.value().to_string(),
        refresh_token: req
            .cookie(REFRESH_TOKEN_COOKIE)
            .map(|c| c.value().to_string()),
        expires_in: None,
    })
}

/// Credentials of the caller; rejects the request with 401 when absent.
///
/// ```ignore
/// async fn protected_route(CallerSession(session): CallerSession) -> impl Responder {
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CallerSession(pub Session);

impl FromRequest for CallerSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            read_session(req)
                .map(CallerSession)
                .ok_or_else(AppError::not_authenticated),
        )
    }
}

/// Optional session extractor - doesn't fail if not signed in.
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<Session>);

impl FromRequest for OptionalSession {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(OptionalSession(read_session(req))))
    }
}

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .finish()
}

/// Cookies persisting a freshly issued session.
pub fn session_cookies(session: &Session, secure: bool) -> Vec<Cookie<'static>> {
    let mut access = base_cookie(ACCESS_TOKEN_COOKIE, session.access_token.clone(), secure);
    if let Some(expires_in) = session.expires_in {
        access.set_max_age(CookieDuration::seconds(expires_in as i64));
    }

    let mut cookies = vec![access];
    if let Some(refresh) = &session.refresh_token {
        cookies.push(base_cookie(REFRESH_TOKEN_COOKIE, refresh.clone(), secure));
    }
    cookies
}

/// Removal cookies for both session cookies.
pub fn cleared_session_cookies(secure: bool) -> Vec<Cookie<'static>> {
    [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE]
        .into_iter()
        .map(|name| removal(name, secure))
        .collect()
}

pub fn code_verifier_cookie(verifier: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(CODE_VERIFIER_COOKIE, verifier, secure);
    cookie.set_max_age(CookieDuration::minutes(CODE_VERIFIER_TTL_MINUTES));
    cookie
}

pub fn cleared_code_verifier_cookie(secure: bool) -> Cookie<'static> {
    removal(CODE_VERIFIER_COOKIE, secure)
}

fn removal(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new(), secure);
    cookie.make_removal();
    cookie
}

pub fn code_verifier(req: &HttpRequest) -> Option<String> {
    req.cookie(CODE_VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
