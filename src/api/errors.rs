use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::dto::ApiResponse;
use crate::error::DbError;

/// Adapter-level error: maps store failures onto the response envelope.
/// Validation rejections are handled inline by the handlers (they need the
/// request context for auditing) and never reach this type.
#[derive(Debug)]
pub struct AppError(pub DbError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            DbError::NotInitialized => (StatusCode::SERVICE_UNAVAILABLE, "database not ready"),
            e => {
                error!(error = %e, "database error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "database error")
            }
        };
        (status, Json(ApiResponse::error(message))).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        Self(e)
    }
}
