//! Search index error types.

use thiserror::Error;

/// Errors from search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// The request was rejected before reaching the backend.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The backend answered with a non-2xx status.
    #[error("{operation} failed with status {status}: {body}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        body: String,
    },

    /// Failed to serialize data for the backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an unexpected status error.
    pub fn unexpected_status(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// The HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_display() {
        let err = SearchIndexError::unexpected_status("Create index", 400, "bad mapping");
        assert_eq!(err.to_string(), "Create index failed with status 400: bad mapping");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_status_absent_for_other_errors() {
        assert_eq!(SearchIndexError::validation("x").status(), None);
        assert_eq!(SearchIndexError::connection("x").status(), None);
    }
}
