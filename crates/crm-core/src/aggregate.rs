//! Aggregate root abstraction.

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::command::Command;
use crate::error::DomainError;
use crate::event::{Event, EventMetadata, EventPayload, StreamId};

/// Tenant- and identity-scoped state shared by every aggregate: the stream
/// identity, the last committed version and the events raised since.
#[derive(Debug, Clone)]
pub struct AggregateBase<E> {
    stream: StreamId,
    version: i64,
    uncommitted_events: Vec<Event<E>>,
}

impl<E: EventPayload> AggregateBase<E> {
    /// Creates the base of a not-yet-persisted aggregate.
    #[must_use]
    pub fn new(aggregate_type: &str, tenant: &str, id: &str) -> Self {
        Self {
            stream: StreamId::new(tenant, aggregate_type, id),
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the stream identity.
    #[must_use]
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Returns the tenant.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.stream.tenant
    }

    /// Returns the aggregate identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.stream.aggregate_id
    }

    /// Returns the last committed version (0 for a new aggregate).
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the version including uncommitted events.
    #[must_use]
    pub fn current_version(&self) -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        let pending = self.uncommitted_events.len() as i64;
        self.version + pending
    }

    /// Returns uncommitted events produced by command handling.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[Event<E>] {
        &self.uncommitted_events
    }

    /// Marks all uncommitted events as persisted.
    pub fn mark_committed(&mut self) {
        self.version = self.current_version();
        self.uncommitted_events.clear();
    }

    /// Advances the committed version past a replayed event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if `version` is not the next
    /// version of the stream, i.e. the history has a gap or is out of order.
    pub fn advance_to(&mut self, version: i64) -> Result<(), DomainError> {
        if version != self.version + 1 {
            return Err(DomainError::Infrastructure(format!(
                "stream {} replayed out of order: expected version {}, got {version}",
                self.stream,
                self.version + 1
            )));
        }
        self.version = version;
        Ok(())
    }

    fn next_event(
        &self,
        payload: E,
        metadata: EventMetadata,
        occurred_at: DateTime<Utc>,
    ) -> Event<E> {
        let version = self.current_version() + 1;
        Event {
            event_id: self.stream.event_id(version),
            stream: self.stream.clone(),
            version,
            payload,
            metadata,
            occurred_at,
        }
    }
}

/// Trait for aggregate roots that reconstitute from event history.
///
/// `when` is the fold: a total match over the aggregate's event enum. Decoding
/// of stored events (and the skipping of stream-marker events) happens before
/// `when` is reached, so an implementation never sees an unknown type.
pub trait AggregateRoot: Send + Sync + Sized {
    /// The event payloads this aggregate produces and consumes.
    type Event: EventPayload;

    /// Aggregate type name, part of every stream identity.
    const AGGREGATE_TYPE: &'static str;

    /// Creates an empty aggregate scoped to `tenant` and `id`.
    fn new(tenant: &str, id: &str) -> Self;

    /// Returns the shared aggregate state.
    fn base(&self) -> &AggregateBase<Self::Event>;

    /// Returns the shared aggregate state mutably.
    fn base_mut(&mut self) -> &mut AggregateBase<Self::Event>;

    /// Folds one event into the domain state.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be applied to the current state.
    fn when(&mut self, event: &Event<Self::Event>) -> Result<(), DomainError>;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str {
        self.base().id()
    }

    /// Returns the tenant.
    fn tenant(&self) -> &str {
        self.base().tenant()
    }

    /// Returns the last committed version.
    fn version(&self) -> i64 {
        self.base().version()
    }

    /// An aggregate that never received an event is "not found".
    fn is_not_found(&self) -> bool {
        self.base().version() == 0 && self.base().uncommitted_events().is_empty()
    }

    /// Raises a new event: builds it at the next version, folds it and records
    /// it as uncommitted.
    ///
    /// # Errors
    ///
    /// Propagates the error from `when`; nothing is recorded in that case.
    fn apply(
        &mut self,
        payload: Self::Event,
        metadata: EventMetadata,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let event = self.base().next_event(payload, metadata, clock.now());
        self.when(&event)?;
        self.base_mut().uncommitted_events.push(event);
        Ok(())
    }

    /// Folds a previously committed event during reconstitution.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on a version gap, or the error
    /// from `when`. The aggregate must be discarded after an error.
    fn replay(&mut self, event: &Event<Self::Event>) -> Result<(), DomainError> {
        self.base_mut().advance_to(event.version)?;
        self.when(event)
    }
}

/// Business handling of one command type by an aggregate.
pub trait HandleCommand<C: Command>: AggregateRoot {
    /// Validates `command` against the current state and raises the resulting
    /// events through [`AggregateRoot::apply`].
    ///
    /// # Errors
    ///
    /// Returns an error when the command is rejected.
    fn handle(&mut self, command: &C, clock: &dyn Clock) -> Result<(), DomainError>;
}
