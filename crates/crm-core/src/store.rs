//! Aggregate store: reconstitution from and persistence to the event log.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event::Event;
use crate::policy::EventTypePolicy;
use crate::repository::{EventRepository, StoredEvent};

/// Loads aggregates by folding their stream and saves their uncommitted
/// events with an expected-version check.
#[derive(Clone)]
pub struct AggregateStore {
    repository: Arc<dyn EventRepository>,
    policy: EventTypePolicy,
}

impl AggregateStore {
    /// Creates a store over `repository` with the default marker policy.
    #[must_use]
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self {
            repository,
            policy: EventTypePolicy::default(),
        }
    }

    /// Replaces the stream-marker policy.
    #[must_use]
    pub fn with_policy(mut self, policy: EventTypePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the underlying event repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<dyn EventRepository> {
        &self.repository
    }

    /// Rebuilds the aggregate `tenant`/`id` from its full history.
    ///
    /// An empty stream yields a fresh aggregate at version 0. Stream-marker
    /// events advance the version without reaching `when`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnsupportedEventType` for event types the
    /// aggregate does not know, `DomainError::Infrastructure` for a corrupt
    /// stream (version gap or reordering) or a repository failure, and
    /// `DomainError::Serialization` for malformed payloads.
    #[instrument(skip(self), fields(aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn load<A: AggregateRoot>(&self, tenant: &str, id: &str) -> Result<A, DomainError> {
        let mut aggregate = A::new(tenant, id);
        let history = self
            .repository
            .load_events(aggregate.base().stream())
            .await?;

        for stored in &history {
            if self.policy.is_internal(&stored.event_type) {
                aggregate.base_mut().advance_to(stored.version)?;
                continue;
            }
            let event = Event::<A::Event>::from_stored(stored)?;
            aggregate.replay(&event)?;
        }

        debug!(version = aggregate.version(), "aggregate loaded");
        Ok(aggregate)
    }

    /// Appends the aggregate's uncommitted events, expecting the stream to be
    /// at the aggregate's committed version.
    ///
    /// Returns the events as stored; saving with nothing pending returns an
    /// empty list without touching the repository.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::WrongExpectedVersion` if another writer appended
    /// first, `DomainError::Serialization` if a payload cannot be encoded, or
    /// the repository's infrastructure error. The aggregate is unchanged on
    /// error.
    #[instrument(
        skip(self, aggregate),
        fields(
            aggregate_type = A::AGGREGATE_TYPE,
            tenant = aggregate.tenant(),
            aggregate_id = aggregate.aggregate_id(),
        )
    )]
    pub async fn save<A: AggregateRoot>(
        &self,
        aggregate: &mut A,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let pending = aggregate.base().uncommitted_events();
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        let stored = pending
            .iter()
            .map(Event::to_stored)
            .collect::<Result<Vec<_>, _>>()?;

        self.repository
            .append_events(aggregate.base().stream(), aggregate.version(), &stored)
            .await?;
        aggregate.base_mut().mark_committed();

        debug!(
            version = aggregate.version(),
            events = stored.len(),
            "aggregate saved"
        );
        Ok(stored)
    }
}
