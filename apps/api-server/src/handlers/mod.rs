//! HTTP handlers and route configuration.

mod auth;
mod callback;
mod health;
mod posts;


use actix_web::{HttpResponse, web};
use quill_core::domain::{Account, Post, SIGN_UP_USERNAME_KEY};
use quill_shared::dto::{AccountResponse, PostResponse};

use crate::middleware::error::AppError;
use crate::state::AppState;

#[cfg(feature = "rate-limit")]
use crate::middleware::rate_limit::RateLimitMiddleware;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    let auth_scope = web::scope("/auth")
        .route("/sign-up", web::post().to(auth::sign_up))
        .route("/sign-in", web::post().to(auth::sign_in))
        .route("/sign-out", web::post().to(auth::sign_out))
        .route("/me", web::get().to(auth::me))
        .route("/oauth/{provider}", web::get().to(auth::begin_oauth))
        .route("/forgot-password", web::post().to(auth::forgot_password))
        .route("/reset-password", web::post().to(auth::reset_password))
        .route("/account", web::delete().to(auth::delete_account));

    // Credential endpoints are throttled per client
    #[cfg(feature = "rate-limit")]
    let auth_scope = auth_scope.wrap(
        RateLimitMiddleware::new(state.auth_limiter.clone())
            .trust_forwarded_for(state.trust_forwarded_for),
    );
    #[cfg(not(feature = "rate-limit"))]
    let _ = state;

    cfg.app_data(json_config())
        .service(
            web::scope("/api")
                // Public routes
                .route("/health", web::get().to(health::health_check))
                .service(auth_scope)
                .service(
                    web::scope("/posts")
                        .route("", web::get().to(posts::list_all))
                        .route("", web::post().to(posts::create))
                        // Registered before `/{id}` so it is not parsed as an id
                        .route("/own-profile", web::get().to(posts::own_profile_id))
                        .route("/{id}", web::put().to(posts::update_own))
                        .route("/{id}", web::delete().to(posts::delete_own)),
                ),
        )
        .route("/auth/callback", web::get().to(callback::oauth_callback));
}

/// Malformed JSON bodies become problem responses like every other error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::bad_request("invalid_body", err.to_string()).into()
    })
}

fn account_response(account: &Account) -> AccountResponse {
    AccountResponse {
        id: account.id,
        email: account.email.clone(),
        username: account.metadata_str(SIGN_UP_USERNAME_KEY).map(String::from),
    }
}

fn post_response(post: Post) -> PostResponse {
    PostResponse {
        id: post.id,
        title: post.title,
        content: post.content,
        profile_id: post.profile_id,
        created_at: post.created_at,
    }
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((actix_web::http::header::LOCATION, location))
        .finish()
}
