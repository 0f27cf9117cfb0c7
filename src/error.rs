use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Ticket, attachment or file absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// A ticket document could not be parsed
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// The manifest is not a well-formed array of entries
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// An attachment body could not be decoded
    #[error("Malformed attachment: {0}")]
    MalformedAttachment(String),

    /// The offset index and the ticket document disagree
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// Operation exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Caller abandoned the operation
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Full-text search errors
    #[error("Search error: {0}")]
    Search(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::MalformedDocument(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MalformedManifest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MalformedAttachment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IntegrityViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            AppError::MalformedManifest(_) => "MALFORMED_MANIFEST",
            AppError::MalformedAttachment(_) => "MALFORMED_ATTACHMENT",
            AppError::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Cancelled(_) => "CANCELLED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Search(_) => "SEARCH_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::debug!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("worker task failed: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Timeout("test".to_string()).status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            AppError::IntegrityViolation("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            AppError::MalformedAttachment("test".to_string()).error_code(),
            "MALFORMED_ATTACHMENT"
        );
        assert!(AppError::Timeout("slow".to_string()).is_retryable());
        assert!(!AppError::NotFound("gone".to_string()).is_retryable());
    }
}
