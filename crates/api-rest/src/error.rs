//! REST error type and its mapping onto HTTP responses.
//!
//! Error bodies are short plain-text messages, except for a failed listing which answers with
//! a JSON object. Internal details are logged, never returned to the client.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use depot_core::LimitError;
use depot_files::FilesError;

/// Errors returned by REST handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Access denied")]
    Forbidden,

    #[error("File not found")]
    NotFound,

    /// The multipart body could not be decoded; carries the status chosen by the extractor
    #[error("{message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Failed to read files")]
    ListFailed,

    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// Maps a storage error raised while handling a name-based request.
    ///
    /// `failure` is the message sent for I/O errors, e.g. `"Download failed"`.
    pub fn from_files(err: FilesError, failure: &'static str) -> Self {
        match err {
            FilesError::Validation(_) => Self::BadRequest("Invalid filename".into()),
            FilesError::AccessDenied(_) => Self::Forbidden,
            FilesError::NotFound(_) => Self::NotFound,
            FilesError::Io(e) => {
                tracing::error!("{}: {}", failure, e);
                Self::Internal(failure)
            }
            FilesError::InvalidRootDirectory(e) => {
                tracing::error!("{}: {}", failure, e);
                Self::Internal(failure)
            }
        }
    }

    /// Maps a storage error raised while storing an upload batch.
    ///
    /// The only validation the storage layer performs on a batch is the byte limit.
    pub fn from_store(err: FilesError, max_file_size: u64) -> Self {
        match err {
            FilesError::Validation(_) => Self::BadRequest(
                LimitError::FileTooLarge {
                    max_bytes: max_file_size,
                }
                .to_string(),
            ),
            other => {
                tracing::error!("Upload failed: {}", other);
                Self::Internal("Upload processing failed")
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Multipart { status, .. } => *status,
            Self::ListFailed | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LimitError> for ApiError {
    fn from(err: LimitError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        tracing::debug!("Rejected multipart body: {}", err);
        Self::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::ListFailed => (
                status,
                Json(serde_json::json!({ "error": self.to_string() })),
            )
                .into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_errors_map_to_client_statuses() {
        let cases = [
            (FilesError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (FilesError::AccessDenied("x".into()), StatusCode::FORBIDDEN),
            (FilesError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                FilesError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from_files(err, "Delete failed").status_code(), status);
        }
    }

    #[test]
    fn test_messages_hide_internal_detail() {
        let err = ApiError::from_files(
            FilesError::Io(std::io::Error::other("/srv/depot/secret")),
            "Download failed",
        );

        assert_eq!(err.to_string(), "Download failed");
        assert_eq!(
            ApiError::from_files(FilesError::Validation("a/b".into()), "x").to_string(),
            "Invalid filename"
        );
    }

    #[test]
    fn test_store_validation_reports_size_limit() {
        let err = ApiError::from_store(FilesError::Validation("big".into()), 2 * 1024 * 1024);

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "File too large. Maximum size: 2MB");
    }

    #[test]
    fn test_limit_errors_become_bad_requests() {
        let err: ApiError = LimitError::TooManyFiles { max: 10 }.into();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Too many files. Maximum: 10 files");
    }
}
