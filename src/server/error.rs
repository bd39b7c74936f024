//! HTTP error type.
//!
//! Handlers return `Result<T, ServerError>`. Client errors echo their message;
//! internal errors are logged in full and answered with a generic body.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Model or feedback-log failure.
    #[error(transparent)]
    Detector(#[from] crate::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            ServerError::Detector(e) => {
                error!(error = %e, "detector error");
                let message = match e {
                    crate::Error::InvalidModelOutput(_) => "classification failed",
                    crate::Error::IOError(_) | crate::Error::CsvError(_) => {
                        "failed to record feedback"
                    }
                    _ => "internal server error",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(e.body_text())
        } else {
            ServerError::BadRequest(e.body_text())
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(e: JsonRejection) -> Self {
        ServerError::BadRequest(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("blocking task failed: {e}"))
    }
}
