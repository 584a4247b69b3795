//! Error types for the dimension search builder.

use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use thiserror::Error;

use hierarchy_client::HierarchyError;
use search_builder_repository::SearchIndexError;

/// Coarse classification of a job failure, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    UpstreamNotFound,
    UpstreamUnexpectedStatus,
    UpstreamInvalidResponse,
    Transport,
    Validation,
    Emit,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::UpstreamNotFound => "upstream_not_found",
            Self::UpstreamUnexpectedStatus => "upstream_unexpected_status",
            Self::UpstreamInvalidResponse => "upstream_invalid_response",
            Self::Transport => "transport",
            Self::Validation => "validation",
            Self::Emit => "emit",
        }
    }
}

/// Errors that end a single index rebuild job.
#[derive(Error, Debug)]
pub enum JobError {
    /// The inbound message could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Error from the hierarchy API.
    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    /// Error from the search index.
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    /// The completion message could not be encoded or sent.
    #[error("Emit error: {0}")]
    Emit(String),
}

impl JobError {
    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an emit error.
    pub fn emit(msg: impl Into<String>) -> Self {
        Self::Emit(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Hierarchy(HierarchyError::NotFound(_)) => ErrorKind::UpstreamNotFound,
            Self::Hierarchy(HierarchyError::UnexpectedStatus { .. }) => {
                ErrorKind::UpstreamUnexpectedStatus
            }
            Self::Hierarchy(HierarchyError::InvalidResponse(_)) => {
                ErrorKind::UpstreamInvalidResponse
            }
            Self::Hierarchy(HierarchyError::Transport(_) | HierarchyError::InvalidUrl(_)) => {
                ErrorKind::Transport
            }
            Self::SearchIndex(SearchIndexError::ValidationError(_)) => ErrorKind::Validation,
            Self::SearchIndex(SearchIndexError::UnexpectedStatus { status: 404, .. }) => {
                ErrorKind::UpstreamNotFound
            }
            Self::SearchIndex(SearchIndexError::UnexpectedStatus { .. }) => {
                ErrorKind::UpstreamUnexpectedStatus
            }
            Self::SearchIndex(SearchIndexError::ConnectionError(_)) => ErrorKind::Transport,
            Self::SearchIndex(SearchIndexError::SerializationError(_)) => ErrorKind::Validation,
            Self::Emit(_) => ErrorKind::Emit,
        }
    }
}

/// Errors from the message queues and the service's own resources.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Recoverable Kafka error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Kafka error after which the client can no longer be used.
    #[error("Fatal Kafka error: {0}")]
    FatalKafkaError(String),

    /// The resource has already been closed.
    #[error("{0} is closed")]
    Closed(String),

    /// HTTP listener error.
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IngestError {
    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a closed error for the named resource.
    pub fn closed(resource: impl Into<String>) -> Self {
        Self::Closed(resource.into())
    }

    /// Create a server error.
    pub fn server(msg: impl Into<String>) -> Self {
        Self::ServerError(msg.into())
    }

    /// Whether the error leaves the resource unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalKafkaError(_) | Self::Closed(_))
    }
}

impl From<KafkaError> for IngestError {
    fn from(err: KafkaError) -> Self {
        match err.rdkafka_error_code() {
            Some(RDKafkaErrorCode::Fatal) => Self::FatalKafkaError(err.to_string()),
            _ => Self::KafkaError(err.to_string()),
        }
    }
}
