//! Event buffer abstraction.
//!
//! The event buffer holds serialized events whose delivery was deferred. An
//! entry becomes due once its `expires_at` has passed and is removed only after
//! it was forwarded successfully.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::repository::StoredEvent;

/// A deferred event awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBufferEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Event type of the buffered event.
    pub event_type: String,
    /// Serialized [`StoredEvent`].
    pub event_data: Vec<u8>,
    /// Instant from which the entry is due.
    pub expires_at: DateTime<Utc>,
    /// Instant the entry was buffered.
    pub created_at: DateTime<Utc>,
}

impl EventBufferEntry {
    /// Buffers `event` until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the event cannot be encoded.
    pub fn for_event(
        event: &StoredEvent,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: event.event_type.clone(),
            event_data: event.to_bytes()?,
            expires_at,
            created_at: now,
        })
    }

    /// Returns `true` once the entry is due for delivery.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Decodes the buffered event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the payload is corrupt.
    pub fn event(&self) -> Result<StoredEvent, DomainError> {
        StoredEvent::from_bytes(&self.event_data)
    }
}

/// Durable storage for deferred events.
#[async_trait]
pub trait EventBufferRepository: Send + Sync {
    /// Store a new entry.
    async fn insert(&self, entry: &EventBufferEntry) -> Result<(), DomainError>;

    /// Entries with `expires_at <= now`, oldest first.
    async fn get_expired(&self, now: DateTime<Utc>) -> Result<Vec<EventBufferEntry>, DomainError>;

    /// Remove a delivered entry. Deleting a missing entry is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), DomainError>;
}
