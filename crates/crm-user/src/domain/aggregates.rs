//! Aggregate roots for the User context.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use crm_core::aggregate::{AggregateBase, AggregateRoot, HandleCommand};
use crm_core::clock::Clock;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::source::{
    ExternalSystem, Precedence, SourceFields, merge_external_system, source_or_internal,
};
use serde::{Deserialize, Serialize};

use super::commands::{AddRole, CreateUser, RemoveRole, UpdateUser};
use super::events::{RoleChanged, UserCreated, UserDetails, UserEvent, UserUpdated};

/// Domain state of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserState {
    /// Descriptive fields.
    pub details: UserDetails,
    /// Roles granted to the user.
    pub roles: BTreeSet<String>,
    /// Where the record came from.
    pub source: SourceFields,
    /// Links to the external systems that hold the record.
    pub external_systems: Vec<ExternalSystem>,
    /// When the record was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserState {
    /// Folds one event into the state.
    pub fn fold(&mut self, event: &UserEvent) {
        match event {
            UserEvent::Created(p) => {
                self.details = p.details.clone();
                self.source = p.source.clone();
                self.created_at = Some(p.created_at);
                self.updated_at = Some(p.updated_at);
                merge_external_system(&mut self.external_systems, p.external_system.as_ref());
            }
            UserEvent::Updated(p) => self.on_updated(p),
            UserEvent::RoleAdded(p) => {
                self.roles.insert(p.role.clone());
                self.updated_at = Some(p.at);
            }
            UserEvent::RoleRemoved(p) => {
                self.roles.remove(&p.role);
                self.updated_at = Some(p.at);
            }
        }
    }

    fn on_updated(&mut self, p: &UserUpdated) {
        let precedence = self.source.resolve_update(&p.source);
        let current = &mut self.details;
        let incoming = &p.details;
        precedence.merge_str(&mut current.name, &incoming.name);
        precedence.merge_str(&mut current.first_name, &incoming.first_name);
        precedence.merge_str(&mut current.last_name, &incoming.last_name);
        precedence.merge_str(&mut current.profile_photo_url, &incoming.profile_photo_url);
        precedence.merge_str(&mut current.timezone, &incoming.timezone);
        if precedence == Precedence::Overwrite {
            current.internal = incoming.internal;
            current.bot = incoming.bot;
        }
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }
}

/// The aggregate root for a user.
#[derive(Debug)]
pub struct User {
    base: AggregateBase<UserEvent>,
    state: UserState,
}

impl User {
    /// Returns the folded domain state.
    #[must_use]
    pub fn state(&self) -> &UserState {
        &self.state
    }
}

impl AggregateRoot for User {
    type Event = UserEvent;
    const AGGREGATE_TYPE: &'static str = "user";

    fn new(tenant: &str, id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, tenant, id),
            state: UserState::default(),
        }
    }

    fn base(&self) -> &AggregateBase<UserEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<UserEvent> {
        &mut self.base
    }

    fn when(&mut self, event: &Event<UserEvent>) -> Result<(), DomainError> {
        self.state.fold(&event.payload);
        Ok(())
    }
}

impl HandleCommand<CreateUser> for User {
    fn handle(&mut self, command: &CreateUser, clock: &dyn Clock) -> Result<(), DomainError> {
        if !self.is_not_found() {
            return Err(DomainError::Validation(format!(
                "user {} already exists",
                self.aggregate_id()
            )));
        }
        let created_at = command.created_at.unwrap_or_else(|| clock.now());
        let event = UserEvent::Created(UserCreated {
            details: command.details.clone(),
            source: command.base.source_fields(&command.source),
            external_system: command.external_system.clone(),
            created_at,
            updated_at: command.updated_at.unwrap_or(created_at),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateUser> for User {
    fn handle(&mut self, command: &UpdateUser, clock: &dyn Clock) -> Result<(), DomainError> {
        let event = UserEvent::Updated(UserUpdated {
            details: command.details.clone(),
            source: source_or_internal(&command.source),
            external_system: command.external_system.clone(),
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<AddRole> for User {
    fn handle(&mut self, command: &AddRole, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.state.roles.contains(&command.role) {
            return Ok(());
        }
        let event = UserEvent::RoleAdded(RoleChanged {
            role: command.role.clone(),
            at: clock.now(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<RemoveRole> for User {
    fn handle(&mut self, command: &RemoveRole, clock: &dyn Clock) -> Result<(), DomainError> {
        if !self.state.roles.contains(&command.role) {
            return Ok(());
        }
        let event = UserEvent::RoleRemoved(RoleChanged {
            role: command.role.clone(),
            at: clock.now(),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

#[cfg(test)]
mod tests {
    use crm_core::command::BaseCommand;
    use crm_test_support::FixedClock;

    use super::*;

    fn created(source: &str) -> User {
        let mut user = User::new("acme", "u-1");
        let command = CreateUser {
            base: BaseCommand::new("acme", "u-1"),
            details: UserDetails {
                name: "Grace Hopper".into(),
                internal: true,
                ..UserDetails::default()
            },
            source: SourceFields {
                source: source.into(),
                ..SourceFields::default()
            },
            ..CreateUser::default()
        };
        user.handle(&command, &FixedClock::default_instant())
            .unwrap();
        user
    }

    fn role_command(role: &str) -> AddRole {
        AddRole {
            base: BaseCommand::new("acme", "u-1"),
            role: role.into(),
        }
    }

    #[test]
    fn test_add_role_is_idempotent() {
        // Arrange
        let mut user = created("openline");
        let clock = FixedClock::default_instant();

        // Act
        user.handle(&role_command("OWNER"), &clock).unwrap();
        user.handle(&role_command("OWNER"), &clock).unwrap();

        // Assert
        assert!(user.state().roles.contains("OWNER"));
        assert_eq!(user.base().uncommitted_events().len(), 2);
    }

    #[test]
    fn test_remove_role_drops_granted_role() {
        let mut user = created("openline");
        let clock = FixedClock::default_instant();
        user.handle(&role_command("OWNER"), &clock).unwrap();

        user.handle(
            &RemoveRole {
                base: BaseCommand::new("acme", "u-1"),
                role: "OWNER".into(),
            },
            &clock,
        )
        .unwrap();

        assert!(user.state().roles.is_empty());
        assert_eq!(user.base().uncommitted_events().len(), 3);
    }

    #[test]
    fn test_external_update_keeps_flags_of_internally_owned_user() {
        let mut user = created("openline");

        user.handle(
            &UpdateUser {
                base: BaseCommand::new("acme", "u-1"),
                details: UserDetails {
                    name: "G. Hopper".into(),
                    timezone: "America/New_York".into(),
                    internal: false,
                    ..UserDetails::default()
                },
                source: "slack".into(),
                ..UpdateUser::default()
            },
            &FixedClock::default_instant(),
        )
        .unwrap();

        assert_eq!(user.state().details.name, "Grace Hopper");
        assert_eq!(user.state().details.timezone, "America/New_York");
        assert!(user.state().details.internal);
    }
}
