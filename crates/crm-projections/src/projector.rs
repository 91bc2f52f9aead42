//! Generic projector folding one aggregate's events into its read record.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crm_contact::domain::aggregates::ContactState;
use crm_contact::domain::events::ContactEvent;
use crm_core::error::DomainError;
use crm_core::event::{Event, EventPayload, StreamId};
use crm_core::policy::EventTypePolicy;
use crm_core::repository::{EventRepository, StoredEvent};
use crm_dispatch::subscription::EventHandler;
use crm_issue::domain::aggregates::IssueState;
use crm_issue::domain::events::IssueEvent;
use crm_opportunity::domain::aggregates::OpportunityState;
use crm_opportunity::domain::events::OpportunityEvent;
use crm_organization::domain::aggregates::OrganizationState;
use crm_organization::domain::events::OrganizationEvent;
use crm_user::domain::aggregates::UserState;
use crm_user::domain::events::UserEvent;

use crate::read_store::{ReadStore, Record, load_record, save_record};

/// Ties an aggregate's events to the read record they fold into.
pub trait Projection: Send + Sync + 'static {
    /// Events of the projected aggregate.
    type Event: EventPayload;
    /// Read-model state.
    type State: Default + Serialize + DeserializeOwned + Send + Sync;
    /// Record kind; the aggregate type.
    const KIND: &'static str;

    /// Folds one event into the state.
    fn fold(state: &mut Self::State, event: &Self::Event);
}

/// Contact read model.
pub struct ContactProjection;

impl Projection for ContactProjection {
    type Event = ContactEvent;
    type State = ContactState;
    const KIND: &'static str = "contact";

    fn fold(state: &mut ContactState, event: &ContactEvent) {
        state.fold(event);
    }
}

/// Issue read model.
pub struct IssueProjection;

impl Projection for IssueProjection {
    type Event = IssueEvent;
    type State = IssueState;
    const KIND: &'static str = "issue";

    fn fold(state: &mut IssueState, event: &IssueEvent) {
        state.fold(event);
    }
}

/// Opportunity read model, queried by the renewal rollout.
pub struct OpportunityProjection;

impl Projection for OpportunityProjection {
    type Event = OpportunityEvent;
    type State = OpportunityState;
    const KIND: &'static str = crate::read_store::OPPORTUNITY;

    fn fold(state: &mut OpportunityState, event: &OpportunityEvent) {
        state.fold(event);
    }
}

/// Organization read model.
pub struct OrganizationProjection;

impl Projection for OrganizationProjection {
    type Event = OrganizationEvent;
    type State = OrganizationState;
    const KIND: &'static str = "organization";

    fn fold(state: &mut OrganizationState, event: &OrganizationEvent) {
        state.fold(event);
    }
}

/// User read model.
pub struct UserProjection;

impl Projection for UserProjection {
    type Event = UserEvent;
    type State = UserState;
    const KIND: &'static str = "user";

    fn fold(state: &mut UserState, event: &UserEvent) {
        state.fold(event);
    }
}

/// Keeps the read record of projection `P` current.
///
/// Events at or below the record's version are skipped, so redelivery is
/// harmless. An event that does not directly follow the record (delivered out
/// of order, or the first one seen since the read store was emptied) makes the
/// projector refold the record from the event log.
pub struct Projector<P> {
    name: String,
    store: Arc<dyn ReadStore>,
    events: Arc<dyn EventRepository>,
    markers: EventTypePolicy,
    projection: PhantomData<fn() -> P>,
}

impl<P: Projection> Projector<P> {
    /// Creates a projector writing to `store` and refolding from `events`.
    #[must_use]
    pub fn new(store: Arc<dyn ReadStore>, events: Arc<dyn EventRepository>) -> Self {
        Self {
            name: format!("{}-projector", P::KIND),
            store,
            events,
            markers: EventTypePolicy::default(),
            projection: PhantomData,
        }
    }

    /// Refolds the record of every stream of `P::KIND` from the event log.
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns the first error from listing or loading streams, decoding an
    /// event or writing a record.
    #[instrument(skip(self), fields(projector = %self.name))]
    pub async fn catch_up(&self) -> Result<usize, DomainError> {
        let streams = self.events.list_streams(P::KIND).await?;
        for stream in &streams {
            let record = self.rebuild(stream).await?;
            save_record(self.store.as_ref(), P::KIND, &record).await?;
        }
        info!(records = streams.len(), "read models rebuilt");
        Ok(streams.len())
    }

    async fn project(&self, stored: &StoredEvent) -> Result<(), DomainError> {
        let tenant = &stored.stream.tenant;
        let id = &stored.stream.aggregate_id;
        let mut record = load_record::<P::State>(self.store.as_ref(), P::KIND, tenant, id)
            .await?
            .unwrap_or_else(|| Record::empty(tenant, id));
        if record.aggregate_version >= stored.version {
            debug!(
                position = %stored.position(),
                projected = record.aggregate_version,
                "event already projected"
            );
            return Ok(());
        }

        if stored.version == record.aggregate_version + 1 {
            self.fold_into(&mut record, stored)?;
        } else {
            warn!(
                position = %stored.position(),
                projected = record.aggregate_version,
                "gap before event, refolding record from the event log"
            );
            record = self.rebuild(&stored.stream).await?;
            if record.aggregate_version < stored.version {
                return Err(DomainError::Infrastructure(format!(
                    "{} is not in the event log, which ends at version {}",
                    stored.position(),
                    record.aggregate_version
                )));
            }
        }
        save_record(self.store.as_ref(), P::KIND, &record).await
    }

    fn fold_into(
        &self,
        record: &mut Record<P::State>,
        stored: &StoredEvent,
    ) -> Result<(), DomainError> {
        if !self.markers.is_internal(&stored.event_type) {
            let event = Event::<P::Event>::from_stored(stored)?;
            P::fold(&mut record.state, &event.payload);
        }
        record.aggregate_version = stored.version;
        Ok(())
    }

    async fn rebuild(&self, stream: &StreamId) -> Result<Record<P::State>, DomainError> {
        let mut record = Record::empty(&stream.tenant, &stream.aggregate_id);
        for stored in self.events.load_events(stream).await? {
            if stored.version != record.aggregate_version + 1 {
                return Err(DomainError::Infrastructure(format!(
                    "stream {stream} replayed out of order: expected version {}, got {}",
                    record.aggregate_version + 1,
                    stored.version
                )));
            }
            self.fold_into(&mut record, &stored)?;
        }
        Ok(record)
    }
}

#[async_trait]
impl<P: Projection> EventHandler for Projector<P> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(projector = %self.name, event_type = %event.event_type))]
    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError> {
        self.project(event).await
    }
}
