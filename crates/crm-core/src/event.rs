//! Domain event abstractions.
//!
//! Events travel in two shapes: the typed [`Event`] an aggregate folds, and the
//! serialized [`StoredEvent`](crate::repository::StoredEvent) the event log
//! persists. The payload of a stored event is an opaque JSON document tagged
//! with its event type and schema version; each aggregate decodes it into its
//! own closed enum of payloads through [`EventPayload::decode`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::repository::StoredEvent;

/// Namespace for deterministic event ids derived from stream positions.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_3b2a_9e47_4d0b_8a55_21c7_e0f4_9d13);

/// Identity of one aggregate instance's event stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    /// Tenant that owns the aggregate.
    pub tenant: String,
    /// Aggregate type name (e.g. `"opportunity"`).
    pub aggregate_type: String,
    /// Aggregate identifier, unique within tenant and type.
    pub aggregate_id: String,
}

impl StreamId {
    /// Creates a stream identity.
    #[must_use]
    pub fn new(
        tenant: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
        }
    }

    /// Returns the position of `version` within this stream, as logged.
    ///
    /// The label is for humans only: tenants and ids may contain `-`, so two
    /// streams can share a label. Use [`event_id`](Self::event_id) as a key.
    #[must_use]
    pub fn position(&self, version: i64) -> String {
        format!("{self}@{version}")
    }

    /// Returns the deterministic event id for `version` within this stream.
    ///
    /// Each identity part seeds the namespace of the next one, so distinct
    /// streams never share an id whatever characters their parts contain.
    /// Re-reading or replaying a stream always yields the same ids, so
    /// projectors may key idempotency on them.
    #[must_use]
    pub fn event_id(&self, version: i64) -> Uuid {
        let tenant = Uuid::new_v5(&EVENT_ID_NAMESPACE, self.tenant.as_bytes());
        let aggregate_type = Uuid::new_v5(&tenant, self.aggregate_type.as_bytes());
        let aggregate = Uuid::new_v5(&aggregate_type, self.aggregate_id.as_bytes());
        Uuid::new_v5(&aggregate, &version.to_be_bytes())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.aggregate_type, self.tenant, self.aggregate_id
        )
    }
}

/// Metadata attached to every domain event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Tenant the event was produced for.
    pub tenant: String,
    /// User that issued the originating command.
    pub user_id: String,
    /// Application that issued the originating command.
    pub app_source: String,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
}

/// A closed set of event payloads belonging to one aggregate type.
pub trait EventPayload: Send + Sync + Clone + fmt::Debug + Sized {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Schema version this payload is encoded with.
    fn schema_version(&self) -> i32 {
        1
    }

    /// Serializes the payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if encoding fails.
    fn encode(&self) -> Result<serde_json::Value, DomainError>;

    /// Decodes a stored payload of the given type and schema version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnsupportedEventType` for unknown event types or
    /// schema versions, and `DomainError::Serialization` for malformed JSON.
    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError>;
}

/// Typed domain event as seen by an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P> {
    /// Deterministic event identifier.
    pub event_id: Uuid,
    /// Stream this event belongs to.
    pub stream: StreamId,
    /// Version within the stream, starting at 1.
    pub version: i64,
    /// Event-specific payload.
    pub payload: P,
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl<P: EventPayload> Event<P> {
    /// Returns the event type name of the payload.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Serializes this event for the event log.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload cannot be encoded.
    pub fn to_stored(&self) -> Result<StoredEvent, DomainError> {
        Ok(StoredEvent {
            event_id: self.event_id,
            stream: self.stream.clone(),
            event_type: self.event_type().to_owned(),
            schema_version: self.payload.schema_version(),
            version: self.version,
            payload: self.payload.encode()?,
            metadata: self.metadata.clone(),
            occurred_at: self.occurred_at,
        })
    }

    /// Decodes a stored event into its typed form.
    ///
    /// # Errors
    ///
    /// Propagates the payload decoding error.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        Ok(Self {
            event_id: stored.event_id,
            stream: stored.stream.clone(),
            version: stored.version,
            payload: P::decode(&stored.event_type, stored.schema_version, &stored.payload)?,
            metadata: stored.metadata.clone(),
            occurred_at: stored.occurred_at,
        })
    }
}

/// Encodes one payload struct to JSON.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if encoding fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<serde_json::Value, DomainError> {
    Ok(serde_json::to_value(payload)?)
}

/// Decodes one payload struct from JSON, naming the event type on failure.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if the JSON does not match `T`.
pub fn decode_payload<T: DeserializeOwned>(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<T, DomainError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| DomainError::Serialization(format!("{event_type}: {e}")))
}

/// Rejects schema versions newer than the decoder understands.
///
/// # Errors
///
/// Returns `DomainError::UnsupportedEventType` when `schema_version` is
/// outside `1..=supported`.
pub fn ensure_schema_version(
    event_type: &str,
    schema_version: i32,
    supported: i32,
) -> Result<(), DomainError> {
    if (1..=supported).contains(&schema_version) {
        Ok(())
    } else {
        Err(DomainError::UnsupportedEventType(format!(
            "{event_type} (schema version {schema_version})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_display_joins_type_tenant_and_id() {
        let stream = StreamId::new("acme", "opportunity", "opp-1");

        assert_eq!(stream.to_string(), "opportunity-acme-opp-1");
        assert_eq!(stream.position(3), "opportunity-acme-opp-1@3");
    }

    #[test]
    fn test_event_id_is_deterministic_per_position() {
        let stream = StreamId::new("acme", "opportunity", "opp-1");
        let other = StreamId::new("globex", "opportunity", "opp-1");

        assert_eq!(stream.event_id(1), stream.event_id(1));
        assert_ne!(stream.event_id(1), stream.event_id(2));
        assert_ne!(stream.event_id(1), other.event_id(1));
    }

    #[test]
    fn test_event_id_distinguishes_streams_with_hyphenated_parts() {
        // Arrange
        let tenant_hyphen = StreamId::new("acme-x", "user", "1");
        let id_hyphen = StreamId::new("acme", "user", "x-1");
        let type_hyphen = StreamId::new("acme", "user-x", "1");
        let shifted = StreamId::new("acme", "user", "x-1");
        let base = StreamId::new("acme-user", "x", "1");

        // Act
        let ids = [
            tenant_hyphen.event_id(1),
            id_hyphen.event_id(1),
            type_hyphen.event_id(1),
            base.event_id(1),
        ];

        // Assert
        assert_eq!(tenant_hyphen.position(1), id_hyphen.position(1));
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(id_hyphen.event_id(1), shifted.event_id(1));
    }

    #[test]
    fn test_ensure_schema_version_rejects_future_versions() {
        assert!(ensure_schema_version("V1_USER_CREATE", 1, 1).is_ok());

        match ensure_schema_version("V1_USER_CREATE", 2, 1) {
            Err(DomainError::UnsupportedEventType(msg)) => {
                assert!(msg.contains("schema version 2"));
            }
            other => panic!("expected UnsupportedEventType, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_payload_names_event_type_on_failure() {
        #[derive(Debug, Deserialize)]
        struct Payload {
            #[allow(dead_code)]
            name: String,
        }

        let result: Result<Payload, _> =
            decode_payload("V1_USER_CREATE", &serde_json::json!({"name": 42}));

        match result {
            Err(DomainError::Serialization(msg)) => assert!(msg.starts_with("V1_USER_CREATE")),
            other => panic!("expected Serialization, got {other:?}"),
        }
    }
}
