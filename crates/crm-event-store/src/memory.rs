//! In-memory repositories with the same contracts as the `PostgreSQL` ones.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crm_core::buffer::{EventBufferEntry, EventBufferRepository};
use crm_core::error::DomainError;
use crm_core::event::StreamId;
use crm_core::repository::{EventRepository, StoredEvent};

/// Event log kept in process memory.
///
/// The log lock is held across the version check and the append. Event ids
/// are unique across streams, as in the `events` table.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    log: Mutex<Log>,
}

#[derive(Debug, Default)]
struct Log {
    streams: HashMap<StreamId, Vec<StoredEvent>>,
    event_ids: HashSet<Uuid>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events across all streams.
    pub async fn len(&self) -> usize {
        self.log.lock().await.event_ids.len()
    }

    /// Returns `true` if no event was ever appended.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .log
            .lock()
            .await
            .streams
            .get(stream)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut log = self.log.lock().await;
        let actual = log
            .streams
            .get(stream)
            .and_then(|existing| existing.last())
            .map_or(0, |event| event.version);
        if actual != expected_version {
            return Err(DomainError::WrongExpectedVersion {
                stream: stream.clone(),
                expected: expected_version,
                actual,
            });
        }
        if let Some(duplicate) = events
            .iter()
            .find(|event| log.event_ids.contains(&event.event_id))
        {
            return Err(DomainError::Infrastructure(format!(
                "duplicate event id {} at {}",
                duplicate.event_id,
                duplicate.position()
            )));
        }
        log.event_ids
            .extend(events.iter().map(|event| event.event_id));
        log.streams
            .entry(stream.clone())
            .or_default()
            .extend_from_slice(events);
        Ok(())
    }

    async fn list_streams(&self, aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        let log = self.log.lock().await;
        let mut streams: Vec<StreamId> = log
            .streams
            .keys()
            .filter(|stream| stream.aggregate_type == aggregate_type)
            .cloned()
            .collect();
        streams.sort();
        Ok(streams)
    }
}

/// Event buffer kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventBufferRepository {
    entries: Mutex<Vec<EventBufferEntry>>,
}

impl InMemoryEventBufferRepository {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all pending entries, due or not.
    pub async fn entries(&self) -> Vec<EventBufferEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl EventBufferRepository for InMemoryEventBufferRepository {
    async fn insert(&self, entry: &EventBufferEntry) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(DomainError::Infrastructure(format!(
                "event buffer entry {} already exists",
                entry.id
            )));
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn get_expired(&self, now: DateTime<Utc>) -> Result<Vec<EventBufferEntry>, DomainError> {
        let mut due: Vec<EventBufferEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|entry| (entry.expires_at, entry.created_at));
        Ok(due)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        self.entries.lock().await.retain(|entry| entry.id != id);
        Ok(())
    }
}
