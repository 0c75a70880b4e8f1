use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::emissions::DatasetError;

/// Handler error rendered as `{"error": ..., "code": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "code": self.status.as_u16(),
            })),
        )
            .into_response()
    }
}

impl From<DatasetError> for ApiError {
    fn from(e: DatasetError) -> Self {
        error!("Emissions dataset unusable: {}", e);
        Self::internal(format!("Emissions data unavailable: {}", e))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Request failed: {:#}", e);
        Self::internal("Internal server error")
    }
}
