//! Commands for the Organization context.

use chrono::{DateTime, Utc};
use crm_core::command::{BaseCommand, Command, require_non_empty};
use crm_core::error::DomainError;
use crm_core::source::{ExternalSystem, FieldMask, SourceFields};

use crate::domain::events::OrganizationDetails;

/// Command to create an organization.
#[derive(Debug, Clone, Default)]
pub struct CreateOrganization {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: OrganizationDetails,
    /// Where the data came from.
    pub source: SourceFields,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Creation time reported by the source; now if absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for CreateOrganization {
    fn command_type(&self) -> &'static str {
        "CreateOrganization"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }
}

/// Command to update the organization fields selected by `fields_mask`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrganization {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: OrganizationDetails,
    /// System the change comes from; blank means the internal source.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields the update touches; empty means all.
    pub fields_mask: FieldMask,
}

impl Command for UpdateOrganization {
    fn command_type(&self) -> &'static str {
        "UpdateOrganization"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Command to hand an organization to a new owner.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrganizationOwner {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// The new owner.
    pub owner_user_id: String,
}

impl Command for UpdateOrganizationOwner {
    fn command_type(&self) -> &'static str {
        "UpdateOrganizationOwner"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn validate(&self) -> Result<(), DomainError> {
        self.base.validate(true)?;
        require_non_empty("owner user id", &self.owner_user_id)?;
        Ok(())
    }
}
