//! Commands for the User context.

use chrono::{DateTime, Utc};
use crm_core::command::{BaseCommand, Command, require_non_empty};
use crm_core::error::DomainError;
use crm_core::source::{ExternalSystem, SourceFields};

use crate::domain::events::UserDetails;

/// Command to create a user.
#[derive(Debug, Clone, Default)]
pub struct CreateUser {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: UserDetails,
    /// Where the data came from.
    pub source: SourceFields,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Creation time reported by the source; now if absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for CreateUser {
    fn command_type(&self) -> &'static str {
        "CreateUser"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }
}

/// Command to update a user's profile.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: UserDetails,
    /// Where the data came from.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for UpdateUser {
    fn command_type(&self) -> &'static str {
        "UpdateUser"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Command to grant a role to an existing user.
#[derive(Debug, Clone, Default)]
pub struct AddRole {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The role to grant or revoke.
    pub role: String,
}

impl Command for AddRole {
    fn command_type(&self) -> &'static str {
        "AddRole"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        self.base.validate(true)?;
        require_non_empty("role", &self.role)?;
        Ok(())
    }
}

/// Command to revoke a role from an existing user.
#[derive(Debug, Clone, Default)]
pub struct RemoveRole {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The role to grant or revoke.
    pub role: String,
}

impl Command for RemoveRole {
    fn command_type(&self) -> &'static str {
        "RemoveRole"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        self.base.validate(true)?;
        require_non_empty("role", &self.role)?;
        Ok(())
    }
}
