//! Commands for the Issue context.

use chrono::{DateTime, Utc};
use crm_core::command::{BaseCommand, Command, require_non_empty};
use crm_core::error::DomainError;
use crm_core::source::{ExternalSystem, SourceFields};

use crate::domain::events::IssueDetails;

/// Command to create an issue.
#[derive(Debug, Clone, Default)]
pub struct CreateIssue {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: IssueDetails,
    /// Organization that reported the issue.
    pub reported_by_organization_id: String,
    /// Organization that submitted the issue.
    pub submitted_by_organization_id: String,
    /// User who submitted the issue.
    pub submitted_by_user_id: String,
    /// Where the data came from.
    pub source: SourceFields,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Creation time reported by the source; now if absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for CreateIssue {
    fn command_type(&self) -> &'static str {
        "CreateIssue"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }
}

/// Command to update an issue's subject, description, status and priority.
#[derive(Debug, Clone, Default)]
pub struct UpdateIssue {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: IssueDetails,
    /// Where the data came from.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for UpdateIssue {
    fn command_type(&self) -> &'static str {
        "UpdateIssue"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Assigns a user to an issue.
#[derive(Debug, Clone, Default)]
pub struct AddUserAssignee {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The user to link or unlink.
    pub user_id: String,
}

/// Unassigns a user from an issue.
#[derive(Debug, Clone, Default)]
pub struct RemoveUserAssignee {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The user to link or unlink.
    pub user_id: String,
}

/// Makes a user follow an issue.
#[derive(Debug, Clone, Default)]
pub struct AddUserFollower {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The user to link or unlink.
    pub user_id: String,
}

/// Stops a user following an issue.
#[derive(Debug, Clone, Default)]
pub struct RemoveUserFollower {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The user to link or unlink.
    pub user_id: String,
}

fn validate_user_link(base: &BaseCommand, user_id: &str) -> Result<(), DomainError> {
    base.validate(true)?;
    require_non_empty("user id", user_id)?;
    Ok(())
}

impl Command for AddUserAssignee {
    fn command_type(&self) -> &'static str {
        "AddUserAssignee"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        validate_user_link(&self.base, &self.user_id)
    }
}

impl Command for RemoveUserAssignee {
    fn command_type(&self) -> &'static str {
        "RemoveUserAssignee"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        validate_user_link(&self.base, &self.user_id)
    }
}

impl Command for AddUserFollower {
    fn command_type(&self) -> &'static str {
        "AddUserFollower"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        validate_user_link(&self.base, &self.user_id)
    }
}

impl Command for RemoveUserFollower {
    fn command_type(&self) -> &'static str {
        "RemoveUserFollower"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        validate_user_link(&self.base, &self.user_id)
    }
}
