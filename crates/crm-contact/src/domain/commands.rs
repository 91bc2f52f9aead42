//! Commands for the Contact context.

use chrono::{DateTime, Utc};
use crm_core::command::{BaseCommand, Command};
use crm_core::source::{ExternalSystem, FieldMask, SourceFields};

use crate::domain::events::ContactDetails;

/// Command to create a contact.
#[derive(Debug, Clone, Default)]
pub struct CreateContact {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: ContactDetails,
    /// Where the data came from.
    pub source: SourceFields,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Creation time reported by the source; now if absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for CreateContact {
    fn command_type(&self) -> &'static str {
        "CreateContact"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }
}

/// Command to update the contact fields selected by `fields_mask`.
#[derive(Debug, Clone, Default)]
pub struct UpdateContact {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: ContactDetails,
    /// System the change comes from; blank means the internal source.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields the update touches; empty means all.
    pub fields_mask: FieldMask,
}

impl Command for UpdateContact {
    fn command_type(&self) -> &'static str {
        "UpdateContact"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}
