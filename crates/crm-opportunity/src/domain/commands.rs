//! Commands for the Opportunity context.

use chrono::{DateTime, Utc};
use crm_core::command::{BaseCommand, Command, require_non_empty};
use crm_core::error::DomainError;
use crm_core::source::{ExternalSystem, FieldMask, SourceFields};

use crate::domain::events::{InternalStage, OpportunityDetails, RenewalLikelihood};

/// Command to create an opportunity.
#[derive(Debug, Clone, Default)]
pub struct CreateOpportunity {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: OpportunityDetails,
    /// Where the data came from.
    pub source: SourceFields,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Defaults to the handling time.
    pub created_at: Option<DateTime<Utc>>,
    /// Defaults to `created_at`.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for CreateOpportunity {
    fn command_type(&self) -> &'static str {
        "CreateOpportunity"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }
}

/// Command to update the commercial fields selected by `fields_mask`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpportunity {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Requested field values.
    pub details: OpportunityDetails,
    /// System the change comes from; blank means the internal source.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    pub external_system: Option<ExternalSystem>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields the update touches; empty means all.
    pub fields_mask: FieldMask,
}

impl Command for UpdateOpportunity {
    fn command_type(&self) -> &'static str {
        "UpdateOpportunity"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Command to create the renewal opportunity of a contract.
#[derive(Debug, Clone, Default)]
pub struct CreateRenewalOpportunity {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Contract being renewed.
    pub contract_id: String,
    /// Defaults to open.
    pub internal_stage: Option<InternalStage>,
    /// Defaults to high.
    pub renewal_likelihood: Option<RenewalLikelihood>,
    /// Whether the renewal was approved.
    pub renewal_approved: bool,
    /// Date of the next renewal.
    pub renewed_at: Option<DateTime<Utc>>,
    /// Percentage, clamped to `0..=100`.
    pub renewal_adjusted_rate: i64,
    /// Where the data came from.
    pub source: SourceFields,
    /// Creation time reported by the source; now if absent.
    pub created_at: Option<DateTime<Utc>>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for CreateRenewalOpportunity {
    fn command_type(&self) -> &'static str {
        "CreateRenewalOpportunity"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn creates_aggregate(&self) -> bool {
        true
    }

    fn validate(&self) -> Result<(), DomainError> {
        self.base.validate(false)?;
        require_non_empty("contract id", &self.contract_id)?;
        Ok(())
    }
}

/// Command to update the renewal fields selected by `fields_mask`.
#[derive(Debug, Clone, Default)]
pub struct UpdateRenewalOpportunity {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Unset means high with a 100% adjusted rate.
    pub renewal_likelihood: Option<RenewalLikelihood>,
    /// Whether the renewal was approved.
    pub renewal_approved: bool,
    /// Date of the next renewal.
    pub renewed_at: Option<DateTime<Utc>>,
    /// Adjusted renewal rate, clamped to 0..=100.
    pub renewal_adjusted_rate: i64,
    /// Expected renewal value.
    pub amount: f64,
    /// Renewal comments.
    pub comments: String,
    /// User who owns the renewal.
    pub owner_user_id: String,
    /// Where the data came from.
    pub source: String,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields the update touches; empty means all.
    pub fields_mask: FieldMask,
}

impl Command for UpdateRenewalOpportunity {
    fn command_type(&self) -> &'static str {
        "UpdateRenewalOpportunity"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Command to move a renewal opportunity to its next cycle date.
#[derive(Debug, Clone, Default)]
pub struct UpdateRenewalOpportunityNextCycleDate {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Date of the next renewal.
    pub renewed_at: Option<DateTime<Utc>>,
    /// Change time reported by the source; now if absent.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Command for UpdateRenewalOpportunityNextCycleDate {
    fn command_type(&self) -> &'static str {
        "UpdateRenewalOpportunityNextCycleDate"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Command to close an opportunity as won.
#[derive(Debug, Clone, Default)]
pub struct CloseWinOpportunity {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Defaults to the handling time.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Command for CloseWinOpportunity {
    fn command_type(&self) -> &'static str {
        "CloseWinOpportunity"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}

/// Command to close an opportunity as lost.
#[derive(Debug, Clone, Default)]
pub struct CloseLooseOpportunity {
    /// Tenant, aggregate id, acting user and idempotency data.
    pub base: BaseCommand,
    /// Defaults to the handling time.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Command for CloseLooseOpportunity {
    fn command_type(&self) -> &'static str {
        "CloseLooseOpportunity"
    }

    fn base(&self) -> &BaseCommand {
        &self.base
    }
}
