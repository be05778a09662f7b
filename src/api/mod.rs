pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::audit::AuditLogger;
use crate::db::repository::Repository;
use handlers::ApiDoc;

/// Shared handler state: the repository plus the audit recorder built on
/// top of it.
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub audit: AuditLogger,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/readings",
            post(handlers::create_reading).get(handlers::list_readings),
        )
        .route("/access-logs", get(handlers::list_access_logs))
        .route("/health", get(handlers::health))
        .with_state(state)
        .split_for_parts();

    router.route(
        "/api-docs/openapi.json",
        get(move || async move { axum::Json(api) }),
    )
}
