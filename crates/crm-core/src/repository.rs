//! Event repository abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{EventMetadata, StreamId};

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Deterministic event identifier derived from the stream position.
    pub event_id: Uuid,
    /// Stream this event belongs to.
    pub stream: StreamId,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Schema version of the payload.
    pub schema_version: i32,
    /// Version within the aggregate stream, starting at 1.
    pub version: i64,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Tenant, user, app source, correlation and causation.
    pub metadata: EventMetadata,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Returns the deterministic position of this event.
    #[must_use]
    pub fn position(&self) -> String {
        self.stream.position(self.version)
    }

    /// Serializes the whole event to bytes for the event buffer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an event previously produced by [`StoredEvent::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the bytes are not a stored event.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Repository trait for loading and appending domain events.
///
/// Implementations must perform the expected-version check and the append as
/// one atomic step: two concurrent appends with the same expected version must
/// not both succeed.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a stream, ordered by version.
    async fn load_events(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append new events to a stream with optimistic concurrency.
    /// `expected_version` is the last known version of the stream.
    async fn append_events(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;

    /// List every stream of `aggregate_type` that holds at least one event,
    /// across all tenants.
    async fn list_streams(&self, aggregate_type: &str) -> Result<Vec<StreamId>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip_preserves_position() {
        let stream = StreamId::new("acme", "user", "u-1");
        let event = StoredEvent {
            event_id: stream.event_id(2),
            stream: stream.clone(),
            event_type: "V1_USER_ADD_ROLE".to_owned(),
            schema_version: 1,
            version: 2,
            payload: serde_json::json!({"role": "ADMIN"}),
            metadata: EventMetadata::default(),
            occurred_at: Utc::now(),
        };

        let decoded = StoredEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, event);
        assert_eq!(decoded.position(), "user-acme-u-1@2");
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            StoredEvent::from_bytes(b"not json"),
            Err(DomainError::Serialization(_))
        ));
    }
}
