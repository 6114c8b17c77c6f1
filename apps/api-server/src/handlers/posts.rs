//! Post handlers. Listing is public; writes act on the caller's own posts.

use actix_web::{HttpResponse, web};

use quill_shared::ApiResponse;
use quill_shared::dto::{
    CreatePostRequest, PostResponse, ProfileIdResponse, StatusResponse, UpdatePostRequest,
};

use super::post_response;
use crate::middleware::error::AppResult;
use crate::middleware::session::{CallerSession, OptionalSession};
use crate::state::AppState;

/// GET /api/posts
pub async fn list_all(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let posts: Vec<PostResponse> = state
        .posts
        .list_all_posts()
        .await?
        .into_iter()
        .map(post_response)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::ok(posts)))
}

/// POST /api/posts
pub async fn create(
    state: web::Data<AppState>,
    CallerSession(session): CallerSession,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let post = state
        .posts
        .create_post(&session, &body.title, &body.content)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(post_response(post))))
}

/// GET /api/posts/own-profile
///
/// Lets clients tell which listed posts are editable.
pub async fn own_profile_id(
    state: web::Data<AppState>,
    OptionalSession(session): OptionalSession,
) -> AppResult<HttpResponse> {
    let profile_id = state.posts.resolve_own_profile_id(session.as_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(ProfileIdResponse { profile_id })))
}

/// PUT /api/posts/{id}
pub async fn update_own(
    state: web::Data<AppState>,
    CallerSession(session): CallerSession,
    post_id: web::Path<i64>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    state
        .posts
        .update_own_post(&session, post_id.into_inner(), &body.title, &body.content)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(StatusResponse::ok())))
}

/// DELETE /api/posts/{id}
pub async fn delete_own(
    state: web::Data<AppState>,
    CallerSession(session): CallerSession,
    post_id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    state
        .posts
        .delete_own_post(&session, post_id.into_inner())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
