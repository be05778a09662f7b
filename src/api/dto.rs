use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

/// Uniform response envelope every endpoint returns, success or failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: Value,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(data: impl Serialize, message: &str) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).unwrap_or_else(|_| json!({})),
            message: message.to_owned(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: json!({}),
            message: message.to_owned(),
        }
    }
}
