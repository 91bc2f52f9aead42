//! Fixtures for this crate's unit tests: a minimal aggregate, its commands and
//! an in-memory repository that can inject conflicts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::aggregate::{AggregateBase, AggregateRoot, HandleCommand};
use crate::clock::Clock;
use crate::command::{BaseCommand, Command, require_non_empty};
use crate::error::DomainError;
use crate::event::{
    Event, EventPayload, StreamId, decode_payload, encode_payload, ensure_schema_version,
};
use crate::repository::{EventRepository, StoredEvent};

pub(crate) struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Named {
    /// Display name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LabelEvent {
    /// The label was created.
    Created(Named),
    /// The label was renamed.
    Renamed(Named),
}

impl EventPayload for LabelEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "V1_LABEL_CREATE",
            Self::Renamed(_) => "V1_LABEL_RENAME",
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) | Self::Renamed(p) => encode_payload(p),
        }
    }

    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError> {
        match event_type {
            "V1_LABEL_CREATE" | "V1_LABEL_RENAME" => {
                ensure_schema_version(event_type, schema_version, 1)?;
            }
            other => return Err(DomainError::UnsupportedEventType(other.to_owned())),
        }
        let named = decode_payload(event_type, payload)?;
        Ok(if event_type == "V1_LABEL_CREATE" {
            Self::Created(named)
        } else {
            Self::Renamed(named)
        })
    }
}

pub(crate) struct Label {
    base: AggregateBase<LabelEvent>,
    /// Every name the label has had, oldest first.
    pub names: Vec<String>,
}

impl AggregateRoot for Label {
    type Event = LabelEvent;
    const AGGREGATE_TYPE: &'static str = "label";

    fn new(tenant: &str, id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, tenant, id),
            names: Vec::new(),
        }
    }

    fn base(&self) -> &AggregateBase<LabelEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<LabelEvent> {
        &mut self.base
    }

    fn when(&mut self, event: &Event<LabelEvent>) -> Result<(), DomainError> {
        match &event.payload {
            LabelEvent::Created(p) | LabelEvent::Renamed(p) if p.name.is_empty() => {
                Err(DomainError::Validation("name must not be empty".into()))
            }
            LabelEvent::Created(p) | LabelEvent::Renamed(p) => {
                self.names.push(p.name.clone());
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct CreateLabel {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Display name.
    pub name: String,
}

impl Command for CreateLabel {
    fn command_type(&self) -> &'static str {
        "CreateLabel"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }

    fn validate(&self) -> Result<(), DomainError> {
        self.base.validate(false)?;
        require_non_empty("name", &self.name)?;
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct RenameLabel {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Display name.
    pub name: String,
}

impl Command for RenameLabel {
    fn command_type(&self) -> &'static str {
        "RenameLabel"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

impl HandleCommand<CreateLabel> for Label {
    fn handle(&mut self, command: &CreateLabel, clock: &dyn Clock) -> Result<(), DomainError> {
        self.apply(
            LabelEvent::Created(Named {
                name: command.name.clone(),
            }),
            command.base.event_metadata(),
            clock,
        )
    }
}

impl HandleCommand<RenameLabel> for Label {
    fn handle(&mut self, command: &RenameLabel, clock: &dyn Clock) -> Result<(), DomainError> {
        self.apply(
            LabelEvent::Renamed(Named {
                name: command.name.clone(),
            }),
            command.base.event_metadata(),
            clock,
        )
    }
}

/// Stream-keyed in-memory repository. `conflicts` makes the next N appends
/// fail with a version conflict, as if another writer had won the race.
#[derive(Default)]
pub(crate) struct MemoryRepository {
    streams: Mutex<HashMap<StreamId, Vec<StoredEvent>>>,
    conflicts: AtomicUsize,
    /// Number of append calls.
    pub appends: AtomicUsize,
    /// Number of load calls.
    pub loads: AtomicUsize,
}

impl MemoryRepository {
    /// Rejects the next `conflicts` appends with a version conflict.
    pub fn with_conflicts(conflicts: usize) -> Self {
        Self {
            conflicts: AtomicUsize::new(conflicts),
            ..Self::default()
        }
    }

    /// Stores `events` as if they had been appended.
    pub async fn seed(&self, events: Vec<StoredEvent>) {
        let mut streams = self.streams.lock().await;
        for event in events {
            streams.entry(event.stream.clone()).or_default().push(event);
        }
    }

    /// Returns a copy of one stream.
    pub async fn stream(&self, stream: &StreamId) -> Vec<StoredEvent> {
        self.streams
            .lock()
            .await
            .get(stream)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventRepository for MemoryRepository {
    async fn load_events(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.stream(stream).await)
    }

    async fn list_streams(&self, aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        Ok(self
            .streams
            .lock()
            .await
            .keys()
            .filter(|stream| stream.aggregate_type == aggregate_type)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DomainError::WrongExpectedVersion {
                stream: stream.clone(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        let mut streams = self.streams.lock().await;
        let existing = streams.entry(stream.clone()).or_default();
        let actual = existing.last().map_or(0, |e| e.version);
        if actual != expected_version {
            return Err(DomainError::WrongExpectedVersion {
                stream: stream.clone(),
                expected: expected_version,
                actual,
            });
        }
        existing.extend_from_slice(events);
        Ok(())
    }
}
