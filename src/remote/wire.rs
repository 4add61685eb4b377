//! JSON bodies of the remote command protocol.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::foundation::core::Vec3;
use crate::foundation::error::BatError;

/// `status` value of successful responses.
pub const STATUS_SUCCESS: &str = "success";
/// `status` value of failed responses.
pub const STATUS_ERROR: &str = "error";

/// Acknowledgement of `POST /`. The command runs on the next host tick, not before this reply.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ack {
    /// Always `"success"`.
    pub status: String,
    /// Human-readable summary.
    pub message: String,
    /// Queue sequence number of the command.
    pub queued: u64,
    /// Paths of keys that were skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored: Vec<String>,
}

/// Reply of `GET /frame`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameReply {
    /// Always `"success"`.
    pub status: String,
    /// Current host frame.
    pub frame: i64,
}

/// Reply of `GET /object?name=...`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObjectReply {
    /// Always `"success"`.
    pub status: String,
    /// Object name as requested.
    pub object: String,
    /// World location.
    pub location: Vec3,
    /// Euler XYZ rotation in radians.
    pub rotation: Vec3,
}

/// Body of every failed request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorReply {
    /// Always `"error"`.
    pub status: String,
    /// Error detail, including the offending field for validation failures.
    pub message: String,
    /// Taxonomy name, e.g. `ValidationError`.
    pub error: String,
}

impl ErrorReply {
    /// Error body with an explicit taxonomy name.
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
            error: kind.to_string(),
        }
    }
}

/// HTTP status for a crate error.
pub fn status_for(err: &BatError) -> StatusCode {
    match err {
        BatError::NotFound { .. } => StatusCode::NOT_FOUND,
        BatError::CapacityExceeded { .. } => StatusCode::CONFLICT,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A crate error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BatError);

impl From<BatError> for ApiError {
    fn from(e: BatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorReply::new(self.0.kind(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/remote/wire.rs"]
mod tests;
