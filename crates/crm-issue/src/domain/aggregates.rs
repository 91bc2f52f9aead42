//! Aggregate roots for the Issue context.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use crm_core::aggregate::{AggregateBase, AggregateRoot, HandleCommand};
use crm_core::clock::Clock;
use crm_core::command::BaseCommand;
use crm_core::error::DomainError;
use crm_core::event::Event;
use crm_core::source::{ExternalSystem, SourceFields, merge_external_system, source_or_internal};
use serde::{Deserialize, Serialize};

use super::commands::{
    AddUserAssignee, AddUserFollower, CreateIssue, RemoveUserAssignee, RemoveUserFollower,
    UpdateIssue,
};
use super::events::{IssueCreated, IssueDetails, IssueEvent, IssueUpdated, IssueUserLink};

/// Domain state of an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueState {
    /// Descriptive fields.
    pub details: IssueDetails,
    /// Organization that reported the issue.
    pub reported_by_organization_id: String,
    /// Organization that submitted the issue.
    pub submitted_by_organization_id: String,
    /// User who submitted the issue.
    pub submitted_by_user_id: String,
    /// Users the issue is assigned to.
    pub assigned_to_user_ids: BTreeSet<String>,
    /// Users following the issue.
    pub followed_by_user_ids: BTreeSet<String>,
    /// Where the record came from.
    pub source: SourceFields,
    /// Links to the external systems that hold the record.
    pub external_systems: Vec<ExternalSystem>,
    /// When the record was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssueState {
    /// Folds one event into the state.
    pub fn fold(&mut self, event: &IssueEvent) {
        match event {
            IssueEvent::Created(p) => self.on_created(p),
            IssueEvent::Updated(p) => self.on_updated(p),
            IssueEvent::AssigneeAdded(p) => {
                self.assigned_to_user_ids.insert(p.user_id.clone());
            }
            IssueEvent::AssigneeRemoved(p) => {
                self.assigned_to_user_ids.remove(&p.user_id);
            }
            IssueEvent::FollowerAdded(p) => {
                self.followed_by_user_ids.insert(p.user_id.clone());
            }
            IssueEvent::FollowerRemoved(p) => {
                self.followed_by_user_ids.remove(&p.user_id);
            }
        }
    }

    fn on_created(&mut self, p: &IssueCreated) {
        self.details = p.details.clone();
        self.reported_by_organization_id.clone_from(&p.reported_by_organization_id);
        self.submitted_by_organization_id.clone_from(&p.submitted_by_organization_id);
        self.submitted_by_user_id.clone_from(&p.submitted_by_user_id);
        self.source = p.source.clone();
        self.created_at = Some(p.created_at);
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }

    fn on_updated(&mut self, p: &IssueUpdated) {
        let precedence = self.source.resolve_update(&p.source);
        let current = &mut self.details;
        precedence.merge_str(&mut current.subject, &p.details.subject);
        precedence.merge_str(&mut current.description, &p.details.description);
        precedence.merge_str(&mut current.status, &p.details.status);
        precedence.merge_str(&mut current.priority, &p.details.priority);
        self.updated_at = Some(p.updated_at);
        merge_external_system(&mut self.external_systems, p.external_system.as_ref());
    }
}

/// The aggregate root for an issue.
#[derive(Debug)]
pub struct Issue {
    base: AggregateBase<IssueEvent>,
    state: IssueState,
}

impl Issue {
    /// Returns the folded domain state.
    #[must_use]
    pub fn state(&self) -> &IssueState {
        &self.state
    }

    /// Raises `raise(link)` unless the membership is `unchanged`.
    fn link_user(
        &mut self,
        unchanged: bool,
        raise: fn(IssueUserLink) -> IssueEvent,
        user_id: &str,
        command: &BaseCommand,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if unchanged {
            return Ok(());
        }
        let event = raise(IssueUserLink {
            user_id: user_id.to_owned(),
            at: clock.now(),
        });
        self.apply(event, command.event_metadata(), clock)
    }
}

impl AggregateRoot for Issue {
    type Event = IssueEvent;
    const AGGREGATE_TYPE: &'static str = "issue";

    fn new(tenant: &str, id: &str) -> Self {
        Self {
            base: AggregateBase::new(Self::AGGREGATE_TYPE, tenant, id),
            state: IssueState::default(),
        }
    }

    fn base(&self) -> &AggregateBase<IssueEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<IssueEvent> {
        &mut self.base
    }

    fn when(&mut self, event: &Event<IssueEvent>) -> Result<(), DomainError> {
        self.state.fold(&event.payload);
        Ok(())
    }
}

impl HandleCommand<CreateIssue> for Issue {
    fn handle(&mut self, command: &CreateIssue, clock: &dyn Clock) -> Result<(), DomainError> {
        if !self.is_not_found() {
            return Err(DomainError::Validation(format!(
                "issue {} already exists",
                self.aggregate_id()
            )));
        }
        let created_at = command.created_at.unwrap_or_else(|| clock.now());
        let event = IssueEvent::Created(IssueCreated {
            details: command.details.clone(),
            reported_by_organization_id: command.reported_by_organization_id.clone(),
            submitted_by_organization_id: command.submitted_by_organization_id.clone(),
            submitted_by_user_id: command.submitted_by_user_id.clone(),
            source: command.base.source_fields(&command.source),
            external_system: command.external_system.clone(),
            created_at,
            updated_at: command.updated_at.unwrap_or(created_at),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<UpdateIssue> for Issue {
    fn handle(&mut self, command: &UpdateIssue, clock: &dyn Clock) -> Result<(), DomainError> {
        let event = IssueEvent::Updated(IssueUpdated {
            details: command.details.clone(),
            source: source_or_internal(&command.source),
            external_system: command.external_system.clone(),
            updated_at: command.updated_at.unwrap_or_else(|| clock.now()),
        });
        self.apply(event, command.base.event_metadata(), clock)
    }
}

impl HandleCommand<AddUserAssignee> for Issue {
    fn handle(&mut self, command: &AddUserAssignee, clock: &dyn Clock) -> Result<(), DomainError> {
        let unchanged = self.state.assigned_to_user_ids.contains(&command.user_id);
        self.link_user(
            unchanged,
            IssueEvent::AssigneeAdded,
            &command.user_id,
            &command.base,
            clock,
        )
    }
}

impl HandleCommand<RemoveUserAssignee> for Issue {
    fn handle(
        &mut self,
        command: &RemoveUserAssignee,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let unchanged = !self.state.assigned_to_user_ids.contains(&command.user_id);
        self.link_user(
            unchanged,
            IssueEvent::AssigneeRemoved,
            &command.user_id,
            &command.base,
            clock,
        )
    }
}

impl HandleCommand<AddUserFollower> for Issue {
    fn handle(&mut self, command: &AddUserFollower, clock: &dyn Clock) -> Result<(), DomainError> {
        let unchanged = self.state.followed_by_user_ids.contains(&command.user_id);
        self.link_user(
            unchanged,
            IssueEvent::FollowerAdded,
            &command.user_id,
            &command.base,
            clock,
        )
    }
}

impl HandleCommand<RemoveUserFollower> for Issue {
    fn handle(
        &mut self,
        command: &RemoveUserFollower,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let unchanged = !self.state.followed_by_user_ids.contains(&command.user_id);
        self.link_user(
            unchanged,
            IssueEvent::FollowerRemoved,
            &command.user_id,
            &command.base,
            clock,
        )
    }
}
