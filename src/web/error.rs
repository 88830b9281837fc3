use crate::core::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Store(StoreError),
    Input(String),
}

impl From<StoreError> for WebError {
    fn from(err: StoreError) -> Self {
        WebError::Store(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Store(StoreError::InvalidIdentifier(msg)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg, "input_error")
            }
            WebError::Store(err @ StoreError::InstanceConflict { .. }) => {
                (StatusCode::CONFLICT, err.to_string(), "conflict")
            }
            WebError::Store(err @ StoreError::StorageUnavailable { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "storage_unavailable",
            ),
            WebError::Store(err @ StoreError::LockError(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "internal_error",
            ),
            WebError::Input(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, "input_error"),
        };

        if status.is_server_error() {
            error!(code, error = %message, "request failed");
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
