use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use collect_core::CollectError;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<CollectError> for AppError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::AuthFailure => Self::unauthorized("authentication failed"),
            CollectError::BadPayload(msg) => Self::bad_request(msg),
            CollectError::PayloadTooLarge { size, limit } => Self::payload_too_large(format!(
                "payload of {size} bytes exceeds limit of {limit} bytes"
            )),
            CollectError::QueueUnavailable(_) | CollectError::UpstreamUnavailable(_) => {
                Self::service_unavailable("dependency unavailable")
            }
            CollectError::PersistenceFailure(_) => Self::internal("database operation failed"),
            CollectError::SerializationFailure(msg) => Self::bad_request(msg),
            CollectError::Timeout(_) => Self::service_unavailable("operation timed out"),
            CollectError::Shutdown => Self::service_unavailable("shutting down"),
            CollectError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
