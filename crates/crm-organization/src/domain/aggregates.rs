//! Aggregate roots for the Organization context.

use chrono::{DateTime, Utc};
use crm_core::aggregate::{AggregateBase, AggregateRoot, HandleCommand};
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::source::{
    ExternalSystem, Precedence, SourceFields, merge_external_system, source_or_internal,
};
use serde::{Deserialize, Serialize};

use super::commands::{CreateOrganization, UpdateOrganization, UpdateOrganizationOwner};
use super::events::{
    FIELD_DESCRIPTION, FIELD_EMPLOYEES, FIELD_HIDE, FIELD_INDUSTRY, FIELD_IS_CUSTOMER,
    FIELD_MARKET, FIELD_NAME, FIELD_SUB_INDUSTRY, FIELD_TARGET_AUDIENCE, FIELD_VALUE_PROPOSITION,
    FIELD_WEBSITE, OrganizationCreated, OrganizationDetails, OrganizationEvent,
    OrganizationUpdated, OwnerUpdated,
};

/// Domain state of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationState {
    /// Descriptive fields.
    pub details: OrganizationDetails,
    /// User who owns the record.
    pub owner_user_id: String,
    /// Where the record came from.
    pub source: SourceFields,
    /// Links to the external systems that hold the record.
    pub external_systems: Vec<ExternalSystem>,
    /// When the record was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrganizationState {
    /// Folds one event into the state.
    pub fn fold(&mut self, event: &OrganizationEvent) {
        match event {
            OrganizationEvent::Created(p) => {
                self.details = p.details.clone();
                self.source = p.source.clone();
                self.created_at = Some(p.created_at);
                self.updated_at = Some(p.updated_at);
                merge_external_system(&mut self.external_systems, p.external_system.as_ref());
            }
            OrganizationEvent::Updated(p) => self.on_updated(p),
            OrganizationEvent::OwnerUpdated(p) => {
                self.owner_user_id.clone_from(&p.owner_user_id);
                self.updated_at = Some(p.updated_at);
            }
            OrganizationEvent::OwnerUpdateNotification(_) => {}
        }
    }

    fn on_updated(&mut self, p: &OrganizationUpdated) {
        let precedence = self.source.resolve_update(&p.source);
        let mask = &p.fields_mask;
        let current = &mut self.details;
        let incoming = &p.details;
        let text: [(&str, &mut String, &str); 8] = [
            (FIELD_NAME, &mut current.name, &incoming.name),
            (FIELD_DESCRIPTION, &mut current.description, &incoming.description),
            (FIELD_WEBSITE, &mut current.website, &incoming.website),
            (FIELD_INDUSTRY, &mut current.industry, &incoming.industry),
            (FIELD_SUB_INDUSTRY, &mut current.sub_industry, &incoming.sub_industry),
            (FIELD_MARKET, &mut current.market, &incoming.market),
            (
                FIELD_TARGET_AUDIENCE,
                &mut current.target_audience,
                &incoming.target_audience,
            ),
            (
                FIELD_VALUE_PROPOSITION,
                &mut current.value_proposition,
                &incoming.value_proposition,
            ),
        ];
        for (field, current, incoming) in text {
            if mask.includes(field) {
                precedence.merge_str(current, incoming);
            }
        }
        // Numbers and flags have no "empty" value to fill.
        if precedence == Precedence::Overwrite {
            if mask.includes(FIELD_EMPLOYEES) {
                current.employees = incoming.employees;
            }
            if mask.includes(FIELD_IS_CUSTOMER) {
                current.is_customer = incoming.is_customer;
            }
            if mask.includes(FIELD_HIDE) {
                current.hide = incoming.hide;
            }
        }
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }
}

/// The aggregate root for an organization.
#[derive(Debug)]
pub struct Organization {
    base: AggregateBase<OrganizationEvent>,
    state: OrganizationState,
}

impl Organization {
    /// Returns the folded domain state.
    #[must_use]
    pub fn state(&self) -> &OrganizationState {
        &self.state
    }
}

impl AggregateRoot for Organization {
    type Event = OrganizationEvent;
    const AGGREGATE_TYPE: &'static str = "organization";

    fn new(tenant: &str, id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, tenant, id),
            state: OrganizationState::default(),
        }
    }

    fn base(&self) -> &AggregateBase<OrganizationEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<OrganizationEvent> {
        &mut self.base
    }

    fn when(&mut self, event: &Event<OrganizationEvent>) -> Result<(), DomainError> {
        self.state.fold(&event.payload);
        Ok(())
    }
}

impl HandleCommand<CreateOrganization> for Organization {
    fn handle(&mut self, command: &CreateOrganization, clock: &dyn Clock) -> Result<(), DomainError> {
        if !self.is_not_found() {
            return Err(DomainError::Validation(format!(
                "organization {} already exists",
                self.aggregate_id()
            )));
        }
        let created_at = command.created_at.unwrap_or_else(|| clock.now());
        let event = OrganizationEvent::Created(OrganizationCreated {
            details: command.details.clone(),
            source: command.base.source_fields(&command.source),
            external_system: command.external_system.clone(),
            created_at,
            updated_at: command.updated_at.unwrap_or(created_at),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateOrganization> for Organization {
    fn handle(&mut self, command: &UpdateOrganization, clock: &dyn Clock) -> Result<(), DomainError> {
        let event = OrganizationEvent::Updated(OrganizationUpdated {
            details: command.details.clone(),
            source: source_or_internal(&command.source),
            external_system: command.external_system.clone(),
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
            fields_mask: command.fields_mask.clone(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateOrganizationOwner> for Organization {
    fn handle(
        &mut self,
        command: &UpdateOrganizationOwner,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state.owner_user_id == command.owner_user_id {
            return Ok(());
        }
        let event = OrganizationEvent::OwnerUpdated(OwnerUpdated {
            owner_user_id: command.owner_user_id.clone(),
            actor_user_id: command.base.logged_in_user_id.clone(),
            updated_at: clock.now(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

#[cfg(test)]
mod tests {
    use crm_core::command::BaseCommand;
    use crm_core::source::FieldMask;
    use crm_test_support::FixedClock;

    use super::*;

    fn created_by(source: &str) -> Organization {
        let mut organization = Organization::new("acme", "org-1");
        let command = CreateOrganization {
            base: BaseCommand::new("acme", "org-1"),
            details: OrganizationDetails {
                name: "Initech".into(),
                market: "B2B".into(),
                employees: 120,
                ..OrganizationDetails::default()
            },
            source: SourceFields {
                source: source.into(),
                ..SourceFields::default()
            },
            ..CreateOrganization::default()
        };
        organization
            .handle(&command, &FixedClock::default_instant())
            .unwrap();
        organization
    }

    #[test]
    fn test_external_update_fills_gaps_and_leaves_numbers_alone() {
        // Arrange
        let mut organization = created_by("openline");
        let command = UpdateOrganization {
            base: BaseCommand::new("acme", "org-1"),
            details: OrganizationDetails {
                name: "Initech LLC".into(),
                industry: "Software".into(),
                employees: 5,
                ..OrganizationDetails::default()
            },
            source: "hubspot".into(),
            ..UpdateOrganization::default()
        };

        // Act
        organization
            .handle(&command, &FixedClock::default_instant())
            .unwrap();

        // Assert
        let details = &organization.state().details;
        assert_eq!(details.name, "Initech");
        assert_eq!(details.industry, "Software");
        assert_eq!(details.market, "B2B");
        assert_eq!(details.employees, 120);
    }

    #[test]
    fn test_masked_update_from_owning_source_touches_only_selected_fields() {
        let mut organization = created_by("hubspot");
        let command = UpdateOrganization {
            base: BaseCommand::new("acme", "org-1"),
            details: OrganizationDetails {
                market: "B2C".into(),
                employees: 7,
                ..OrganizationDetails::default()
            },
            source: "hubspot".into(),
            fields_mask: FieldMask::of([FIELD_MARKET, FIELD_EMPLOYEES]),
            ..UpdateOrganization::default()
        };

        organization
            .handle(&command, &FixedClock::default_instant())
            .unwrap();

        let details = &organization.state().details;
        assert_eq!(details.name, "Initech");
        assert_eq!(details.market, "B2C");
        assert_eq!(details.employees, 7);
    }

    #[test]
    fn test_owner_change_is_recorded_once() {
        // Arrange
        let mut organization = created_by("openline");
        let command = UpdateOrganizationOwner {
            base: BaseCommand::new("acme", "org-1").by_user("u-admin"),
            owner_user_id: "u-9".into(),
        };
        let clock = FixedClock::default_instant();

        // Act
        organization.handle(&command, &clock).unwrap();
        organization.handle(&command, &clock).unwrap();

        // Assert
        assert_eq!(organization.state().owner_user_id, "u-9");
        let events = organization.base().uncommitted_events();
        assert_eq!(events.len(), 2);
        match &events[1].payload {
            OrganizationEvent::OwnerUpdated(p) => assert_eq!(p.actor_user_id, "u-admin"),
            other => panic!("expected OwnerUpdated, got {other:?}"),
        }
    }
}
