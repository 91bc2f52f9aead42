//! Domain error types.

use thiserror::Error;

use crate::event::StreamId;

/// Top-level domain error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A command or event failed structural or business validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The aggregate has no events but the command requires an existing one.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(StreamId),

    /// Optimistic concurrency conflict on append.
    #[error("wrong expected version on stream {stream}: expected {expected}, found {actual}")]
    WrongExpectedVersion {
        /// The stream that had the conflict.
        stream: StreamId,
        /// The version the writer expected the stream to be at.
        expected: i64,
        /// The version the stream was actually at.
        actual: i64,
    },

    /// An event type the aggregate does not know how to fold.
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// An event payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for optimistic-lock conflicts, the only error the
    /// command handler retries.
    #[must_use]
    pub fn is_wrong_expected_version(&self) -> bool {
        matches!(self, Self::WrongExpectedVersion { .. })
    }

    /// Returns `true` when the error reports a missing aggregate.
    #[must_use]
    pub fn is_aggregate_not_found(&self) -> bool {
        matches!(self, Self::AggregateNotFound(_))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
