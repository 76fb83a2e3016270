//! Error types for the library

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Why an upload payload was refused at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnsupportedType,
    TooLarge,
    Empty,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnsupportedType => write!(f, "unsupported content type"),
            RejectReason::TooLarge => write!(f, "file too large"),
            RejectReason::Empty => write!(f, "empty file"),
        }
    }
}

/// Library error types
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Missing or unrecognized role: {0}")]
    InvalidRole(String),

    #[error("Permission denied: {action}")]
    Forbidden { action: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload rejected ({reason}): {detail}")]
    PayloadRejected { reason: RejectReason, detail: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Annotation not found: {0}")]
    AnnotationNotFound(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Batch partially failed: {succeeded} stored, {rejected} rejected")]
    PartialBatchFailure { succeeded: usize, rejected: usize },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LibraryError {
    pub fn forbidden(action: impl Into<String>) -> Self {
        LibraryError::Forbidden {
            action: action.into(),
        }
    }

    pub fn rejected(reason: RejectReason, detail: impl Into<String>) -> Self {
        LibraryError::PayloadRejected {
            reason,
            detail: detail.into(),
        }
    }

    /// Convert to API error code
    pub fn code(&self) -> &'static str {
        match self {
            LibraryError::InvalidRole(_) => "INVALID_ROLE",
            LibraryError::Forbidden { .. } => "FORBIDDEN",
            LibraryError::Validation(_) => "VALIDATION_ERROR",
            LibraryError::PayloadRejected { .. } => "PAYLOAD_REJECTED",
            LibraryError::DocumentNotFound(_) => "DOCUMENT_NOT_FOUND",
            LibraryError::AnnotationNotFound(_) => "ANNOTATION_NOT_FOUND",
            LibraryError::BlobNotFound(_) => "BLOB_NOT_FOUND",
            LibraryError::StorageWriteFailed(_) => "STORAGE_WRITE_FAILED",
            LibraryError::PartialBatchFailure { .. } => "PARTIAL_BATCH_FAILURE",
            LibraryError::Database(_) => "DATABASE_ERROR",
            LibraryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            LibraryError::InvalidRole(_) => StatusCode::UNAUTHORIZED,

            LibraryError::Forbidden { .. } => StatusCode::FORBIDDEN,

            LibraryError::Validation(_) => StatusCode::BAD_REQUEST,

            LibraryError::PayloadRejected { reason, .. } => match reason {
                RejectReason::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                RejectReason::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                RejectReason::Empty => StatusCode::BAD_REQUEST,
            },

            LibraryError::DocumentNotFound(_)
            | LibraryError::AnnotationNotFound(_)
            | LibraryError::BlobNotFound(_) => StatusCode::NOT_FOUND,

            LibraryError::PartialBatchFailure { .. } => StatusCode::MULTI_STATUS,

            LibraryError::StorageWriteFailed(_)
            | LibraryError::Database(_)
            | LibraryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, serializable form used in HTTP bodies and batch outcomes
    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<mongodb::error::Error> for LibraryError {
    fn from(err: mongodb::error::Error) -> Self {
        LibraryError::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for LibraryError {
    fn from(err: bson::ser::Error) -> Self {
        LibraryError::Internal(err.to_string())
    }
}

impl From<bson::de::Error> for LibraryError {
    fn from(err: bson::de::Error) -> Self {
        LibraryError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::StorageWriteFailed(err.to_string())
    }
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        LibraryError::Internal(format!("request failed: {}", err))
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Validation(err.to_string())
    }
}

/// API error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }
        (status, axum::Json(self.to_api_error())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(LibraryError::InvalidRole("x".into()).code(), "INVALID_ROLE");
        assert_eq!(LibraryError::forbidden("delete").code(), "FORBIDDEN");
        assert_eq!(
            LibraryError::StorageWriteFailed("disk".into()).code(),
            "STORAGE_WRITE_FAILED"
        );
    }

    #[test]
    fn test_payload_rejection_status() {
        let too_large = LibraryError::rejected(RejectReason::TooLarge, "11 MiB");
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let wrong_type = LibraryError::rejected(RejectReason::UnsupportedType, "image/png");
        assert_eq!(wrong_type.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(wrong_type.code(), too_large.code());
    }

    #[test]
    fn test_not_found_kinds_stay_distinct() {
        let doc = LibraryError::DocumentNotFound("a".into()).to_api_error();
        let blob = LibraryError::BlobNotFound("a".into()).to_api_error();
        assert_ne!(doc.code, blob.code);
        assert_eq!(
            LibraryError::DocumentNotFound("a".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
