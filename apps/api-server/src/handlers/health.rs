//! Liveness endpoint.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
    environment: &'static str,
    uptime_secs: i64,
}

/// GET /api/health
///
/// Touches no collaborator, so a slow database or identity provider never
/// fails the health check.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: if state.is_local { "local" } else { "deployed" },
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}
