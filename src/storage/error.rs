//! Error types for storage backends

use crate::error::AppError;
use std::path::PathBuf;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while resolving documents from a backend.
///
/// Both backends report a missing document as [`StorageError::NotFound`], so
/// callers cannot tell from the error alone which backend is in use.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The logical name does not resolve to a document
    #[error("{name} not found in {}", location.display())]
    NotFound { name: String, location: PathBuf },

    /// The backend could not be opened
    #[error("Failed to open {}: {message}", location.display())]
    OpenFailed { location: PathBuf, message: String },

    /// Reading an existing document failed
    #[error("Failed to read {name}: {message}")]
    ReadFailed { name: String, message: String },

    /// The backend was released and can no longer serve reads
    #[error("Storage backend {} is closed", location.display())]
    Closed { location: PathBuf },
}

impl StorageError {
    pub fn not_found(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        StorageError::NotFound {
            name: name.into(),
            location: location.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StorageError::OpenFailed { .. } => AppError::Configuration(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}
