//! Forwarding of buffered events into the event log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crm_core::handler::EventPublisher;
use crm_core::repository::{EventRepository, StoredEvent};

use crate::retry::RemoteError;

/// Delivers a buffered event to its ingestion endpoint.
#[async_trait]
pub trait EventForwarder: Send + Sync {
    /// Forward one event. Delivery is at-least-once: a forwarded event may be
    /// offered again if removing it from the buffer fails.
    async fn forward(&self, event: &StoredEvent) -> Result<(), RemoteError>;
}

/// Ingests buffered events by appending them at the head of their stream and
/// then publishing them to subscribers.
///
/// A buffered event's version is provisional: it is re-stamped (together with
/// its event id) to the stream's next version at ingestion time.
pub struct LogIngestionForwarder {
    repository: Arc<dyn EventRepository>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl LogIngestionForwarder {
    /// Creates a forwarder that appends into `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self {
            repository,
            publisher: None,
        }
    }

    /// Publishes ingested events to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }
}

#[async_trait]
impl EventForwarder for LogIngestionForwarder {
    async fn forward(&self, event: &StoredEvent) -> Result<(), RemoteError> {
        let history = self
            .repository
            .load_events(&event.stream)
            .await
            .map_err(RemoteError::from)?;
        let head = history.last().map_or(0, |e| e.version);

        let mut ingested = event.clone();
        ingested.version = head + 1;
        ingested.event_id = event.stream.event_id(ingested.version);

        self.repository
            .append_events(&event.stream, head, std::slice::from_ref(&ingested))
            .await
            .map_err(RemoteError::from)?;
        debug!(position = %ingested.position(), "buffered event ingested");

        if let Some(publisher) = &self.publisher {
            if let Err(err) = publisher.publish(std::slice::from_ref(&ingested)).await {
                error!(error = %err, position = %ingested.position(), "publishing ingested event failed");
            }
        }
        Ok(())
    }
}
