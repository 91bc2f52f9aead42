//! Stored-event builders.

use chrono::Utc;
use crm_core::event::{EventMetadata, StreamId};
use crm_core::repository::StoredEvent;

/// Builds a stored event at `version` of `stream` with the given type and
/// payload, and metadata naming the stream's tenant.
#[must_use]
pub fn stored_event(
    stream: &StreamId,
    version: i64,
    event_type: &str,
    payload: serde_json::Value,
) -> StoredEvent {
    StoredEvent {
        event_id: stream.event_id(version),
        stream: stream.clone(),
        event_type: event_type.to_owned(),
        schema_version: 1,
        version,
        payload,
        metadata: EventMetadata {
            tenant: stream.tenant.clone(),
            ..EventMetadata::default()
        },
        occurred_at: Utc::now(),
    }
}
