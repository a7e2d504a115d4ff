use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use crate::alerts::AlertError;
use crate::directory::DirectoryError;
use crate::mirrors::MirrorError;
use crate::snapshot::SnapshotError;
use crate::telemetry::TelemetryError;

/// Seconds a client should wait before retrying an unavailable backend.
const RETRY_AFTER_SECS: &str = "30";

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Conflict { message: String, existing_id: Uuid },
    Unavailable(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Conflict { message, existing_id } => {
                write!(f, "Conflict: {message} (existing {existing_id})")
            }
            AppError::Unavailable(msg) => write!(f, "Unavailable: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Conflict { message, existing_id } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "existing_id": existing_id }),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Backend unavailable: {msg}");
                let body = json!({
                    "error": "Tracking backend unavailable, try again later",
                    "retryable": true,
                });
                let mut response = (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
                return response;
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SnapshotError> for AppError {
    fn from(err: SnapshotError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Validation(msg) => AppError::BadRequest(msg),
            DirectoryError::Conflict { message, existing_id } => {
                AppError::Conflict { message, existing_id }
            }
            DirectoryError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            DirectoryError::Snapshot(e) => e.into(),
        }
    }
}

impl From<MirrorError> for AppError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::Validation(msg) => AppError::BadRequest(msg),
            MirrorError::NotFound => AppError::NotFound("Mirror not found".to_string()),
            MirrorError::Snapshot(e) => e.into(),
        }
    }
}

impl From<AlertError> for AppError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::Validation(msg) => AppError::BadRequest(msg),
            AlertError::Snapshot(e) => e.into(),
        }
    }
}

impl From<TelemetryError> for AppError {
    fn from(err: TelemetryError) -> Self {
        match err {
            TelemetryError::Unavailable(msg) => AppError::Unavailable(msg),
            TelemetryError::Query(msg) | TelemetryError::Decode(msg) => AppError::Internal(msg),
        }
    }
}
