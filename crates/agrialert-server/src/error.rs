use agrialert_alerts::AlertError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned from request handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Alert(#[from] AlertError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::MalformedPayload(rejection.body_text())
    }
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::Alert(AlertError::invalid_input(message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Alert(AlertError::InvalidInput(_) | AlertError::InvalidCode(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Alert(AlertError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Alert(AlertError::Transport(_)) => StatusCode::BAD_GATEWAY,
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Alert(e) => {
                if !e.is_client_error() {
                    tracing::error!("Provider call failed: {}", e);
                }
                e.user_message()
            }
            ApiError::MalformedPayload(_) => self.to_string(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
