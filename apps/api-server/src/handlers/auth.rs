//! Account handlers: registration, password sign-in, OAuth start, password
//! reset and account deletion.

use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, http::header, web};

use quill_core::error::DomainError;
use quill_core::services::DELETE_CONFIRMATION_PHRASE;
use quill_shared::ApiResponse;
use quill_shared::dto::{
    DeleteAccountRequest, ForgotPasswordRequest, ResetPasswordRequest, SessionResponse,
    SignInRequest, SignUpRequest, StatusResponse,
};

use super::account_response;
use crate::middleware::error::AppResult;
use crate::middleware::session::{
    CallerSession, cleared_code_verifier_cookie, cleared_session_cookies, code_verifier,
    code_verifier_cookie, session_cookies,
};
use crate::state::AppState;

fn with_cleared_session(mut builder: HttpResponseBuilder, secure: bool) -> HttpResponseBuilder {
    for cookie in cleared_session_cookies(secure) {
        builder.cookie(cookie);
    }
    builder
}

/// POST /api/auth/sign-up
pub async fn sign_up(
    state: web::Data<AppState>,
    body: web::Json<SignUpRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let account = state
        .accounts
        .sign_up(&req.username, &req.email, &req.password)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        account_response(&account),
        "Check your email to confirm the account",
    )))
}

/// POST /api/auth/sign-in
pub async fn sign_in(
    state: web::Data<AppState>,
    body: web::Json<SignInRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    let auth = state.accounts.sign_in(&req.email, &req.password).await?;

    let mut response = HttpResponse::Ok();
    for cookie in session_cookies(&auth.session, !state.is_local) {
        response.cookie(cookie);
    }
    Ok(response.json(ApiResponse::ok(SessionResponse {
        access_token: auth.session.access_token.clone(),
        token_type: "Bearer".to_string(),
        expires_in: auth.session.expires_in,
        account: account_response(&auth.account),
    })))
}

/// POST /api/auth/sign-out
///
/// Cookies are cleared even when the provider fails to revoke the session.
pub async fn sign_out(
    state: web::Data<AppState>,
    CallerSession(session): CallerSession,
) -> HttpResponse {
    if let Err(e) = state.accounts.sign_out(&session).await {
        tracing::warn!(error = %e, "Session revocation failed; clearing cookies anyway");
    }

    with_cleared_session(HttpResponse::Ok(), !state.is_local)
        .json(ApiResponse::ok(StatusResponse::ok()))
}

/// GET /api/auth/me - Protected route
pub async fn me(
    state: web::Data<AppState>,
    CallerSession(session): CallerSession,
) -> AppResult<HttpResponse> {
    let account = state.accounts.current_account(&session).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(account_response(&account))))
}

/// GET /api/auth/oauth/{provider}
///
/// Redirects to the provider; the PKCE verifier waits in a cookie until
/// `/auth/callback` redeems the code.
pub async fn begin_oauth(
    state: web::Data<AppState>,
    provider: web::Path<String>,
) -> AppResult<HttpResponse> {
    let start = state.accounts.begin_oauth(&provider)?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, start.url))
        .cookie(code_verifier_cookie(start.code_verifier, !state.is_local))
        .finish())
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> AppResult<HttpResponse> {
    let verifier = state.accounts.request_password_reset(&body.email).await?;

    Ok(HttpResponse::Ok()
        .cookie(code_verifier_cookie(verifier, !state.is_local))
        .json(ApiResponse::ok_with_message(
            StatusResponse::ok(),
            "If an account exists for this address, a reset link is on its way",
        )))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Json<ResetPasswordRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let verifier = req.code_verifier.or_else(|| code_verifier(&request));

    state
        .accounts
        .reset_password(&req.code, verifier.as_deref(), &req.password)
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(cleared_code_verifier_cookie(!state.is_local))
        .json(ApiResponse::ok(StatusResponse::ok())))
}

/// DELETE /api/auth/account
pub async fn delete_account(
    state: web::Data<AppState>,
    CallerSession(session): CallerSession,
    body: web::Json<DeleteAccountRequest>,
) -> AppResult<HttpResponse> {
    confirm_deletion(&body.confirmation)?;

    state.accounts.delete_account(&session).await?;

    Ok(with_cleared_session(HttpResponse::Ok(), !state.is_local)
        .json(ApiResponse::ok(StatusResponse::ok())))
}

fn confirm_deletion(confirmation: &str) -> Result<(), DomainError> {
    if confirmation != DELETE_CONFIRMATION_PHRASE {
        return Err(DomainError::Validation(format!(
            "Type {} to confirm account deletion",
            DELETE_CONFIRMATION_PHRASE
        )));
    }
    Ok(())
}
