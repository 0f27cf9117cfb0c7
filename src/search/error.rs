//! Error types for search operations

use crate::error::AppError;
use std::time::Duration;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors raised while building, opening or querying the ticket index
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The index could not be created or opened
    #[error("Index initialization failed: {0}")]
    IndexInitFailed(String),

    /// Nothing usable at the configured index location
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The query string is not valid query syntax
    #[error("Query parsing failed: {0}")]
    QueryParsingFailed(String),

    #[error("Search execution failed: {0}")]
    SearchFailed(String),

    /// Adding or committing tickets failed
    #[error("Ticket indexing failed: {0}")]
    IndexingFailed(String),

    /// The index was built with a different schema
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The caller went away before the search finished
    #[error("Search cancelled")]
    Cancelled,

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),
}

impl SearchError {
    /// Whether the error comes from the request rather than the index
    pub fn is_client_error(&self) -> bool {
        matches!(self, SearchError::QueryParsingFailed(_))
    }
}

impl From<tantivy::query::QueryParserError> for SearchError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        SearchError::QueryParsingFailed(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Cancelled => AppError::Cancelled(err.to_string()),
            SearchError::Timeout(_) => AppError::Timeout(err.to_string()),
            SearchError::IndexNotFound(_) => AppError::Configuration(err.to_string()),
            SearchError::IoError(err) => AppError::Io(err),
            _ => AppError::Search(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_mapping() {
        assert!(matches!(
            AppError::from(SearchError::Cancelled),
            AppError::Cancelled(_)
        ));

        let timeout = AppError::from(SearchError::Timeout(Duration::from_secs(8)));
        assert!(timeout.is_retryable());

        assert!(matches!(
            AppError::from(SearchError::IndexNotFound("out/index.tantivy".to_string())),
            AppError::Configuration(_)
        ));
        assert!(SearchError::QueryParsingFailed("x".to_string()).is_client_error());
    }
}
