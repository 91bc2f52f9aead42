//! Outbox for events whose delivery is deferred.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crm_core::buffer::{EventBufferEntry, EventBufferRepository};
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::repository::StoredEvent;

/// Writes events into the event buffer for later delivery.
#[derive(Clone)]
pub struct EventOutbox {
    buffer: Arc<dyn EventBufferRepository>,
    clock: Arc<dyn Clock>,
}

impl EventOutbox {
    /// Creates an outbox over `buffer`.
    #[must_use]
    pub fn new(buffer: Arc<dyn EventBufferRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { buffer, clock }
    }

    /// Buffers `event` for delivery once `delay` has passed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the event cannot be encoded, or
    /// the buffer's infrastructure error.
    pub async fn defer(&self, event: &StoredEvent, delay: Duration) -> Result<Uuid, DomainError> {
        let due = self.clock.now() + delay;
        self.defer_until(event, due).await
    }

    /// Buffers `event` for delivery from `due` on.
    ///
    /// # Errors
    ///
    /// Same as [`EventOutbox::defer`].
    pub async fn defer_until(
        &self,
        event: &StoredEvent,
        due: DateTime<Utc>,
    ) -> Result<Uuid, DomainError> {
        let entry = EventBufferEntry::for_event(event, due, self.clock.now())?;
        self.buffer.insert(&entry).await?;
        info!(
            entry_id = %entry.id,
            event_type = %entry.event_type,
            stream = %event.stream,
            expires_at = %due,
            "event deferred"
        );
        Ok(entry.id)
    }
}
