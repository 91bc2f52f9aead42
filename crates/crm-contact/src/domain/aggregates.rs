//! Aggregate roots for the Contact context.

use chrono::{DateTime, Utc};
use crm_core::aggregate::{AggregateBase, AggregateRoot, HandleCommand};
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::source::{ExternalSystem, SourceFields, merge_external_system, source_or_internal};
use serde::{Deserialize, Serialize};

use super::commands::{CreateContact, UpdateContact};
use super::events::{
    ContactCreated, ContactDetails, ContactEvent, ContactUpdated, FIELD_DESCRIPTION,
    FIELD_FIRST_NAME, FIELD_LAST_NAME, FIELD_NAME, FIELD_PREFIX, FIELD_PROFILE_PHOTO_URL,
    FIELD_TIMEZONE, FIELD_USERNAME,
};

/// Domain state of a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactState {
    /// Descriptive fields.
    pub details: ContactDetails,
    /// Where the record came from.
    pub source: SourceFields,
    /// Links to the external systems that hold the record.
    pub external_systems: Vec<ExternalSystem>,
    /// When the record was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContactState {
    /// Folds one event into the state.
    pub fn fold(&mut self, event: &ContactEvent) {
        match event {
            ContactEvent::Created(p) => {
                self.details = p.details.clone();
                self.source = p.source.clone();
                self.created_at = Some(p.created_at);
                self.updated_at = Some(p.updated_at);
                merge_external_system(&mut self.external_systems, p.external_system.as_ref());
            }
            ContactEvent::Updated(p) => self.on_updated(p),
        }
    }

    fn on_updated(&mut self, p: &ContactUpdated) {
        let precedence = self.source.resolve_update(&p.source);
        let current = &mut self.details;
        let incoming = &p.details;
        let fields: [(&str, &mut String, &str); 8] = [
            (FIELD_FIRST_NAME, &mut current.first_name, &incoming.first_name),
            (FIELD_LAST_NAME, &mut current.last_name, &incoming.last_name),
            (FIELD_NAME, &mut current.name, &incoming.name),
            (FIELD_PREFIX, &mut current.prefix, &incoming.prefix),
            (FIELD_DESCRIPTION, &mut current.description, &incoming.description),
            (FIELD_TIMEZONE, &mut current.timezone, &incoming.timezone),
            (
                FIELD_PROFILE_PHOTO_URL,
                &mut current.profile_photo_url,
                &incoming.profile_photo_url,
            ),
            (FIELD_USERNAME, &mut current.username, &incoming.username),
        ];
        for (field, current, incoming) in fields {
            if p.fields_mask.includes(field) {
                precedence.merge_str(current, incoming);
            }
        }
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }
}

/// The aggregate root for a contact.
#[derive(Debug)]
pub struct Contact {
    base: AggregateBase<ContactEvent>,
    state: ContactState,
}

impl Contact {
    /// Returns the folded domain state.
    #[must_use]
    pub fn state(&self) -> &ContactState {
        &self.state
    }
}

impl AggregateRoot for Contact {
    type Event = ContactEvent;
    const AGGREGATE_TYPE: &'static str = "contact";

    fn new(tenant: &str, id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, tenant, id),
            state: ContactState::default(),
        }
    }

    fn base(&self) -> &AggregateBase<ContactEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<ContactEvent> {
        &mut self.base
    }

    fn when(&mut self, event: &Event<ContactEvent>) -> Result<(), DomainError> {
        self.state.fold(&event.payload);
        Ok(())
    }
}

impl HandleCommand<CreateContact> for Contact {
    fn handle(&mut self, command: &CreateContact, clock: &dyn Clock) -> Result<(), DomainError> {
        if !self.is_not_found() {
            return Err(DomainError::Validation(format!(
                "contact {} already exists",
                self.aggregate_id()
            )));
        }
        let created_at = command.created_at.unwrap_or_else(|| clock.now());
        let event = ContactEvent::Created(ContactCreated {
            details: command.details.clone(),
            source: command.base.source_fields(&command.source),
            external_system: command.external_system.clone(),
            created_at,
            updated_at: command.updated_at.unwrap_or(created_at),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateContact> for Contact {
    fn handle(&mut self, command: &UpdateContact, clock: &dyn Clock) -> Result<(), DomainError> {
        let event = ContactEvent::Updated(ContactUpdated {
            details: command.details.clone(),
            source: source_or_internal(&command.source),
            external_system: command.external_system.clone(),
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
            fields_mask: command.fields_mask.clone(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}
