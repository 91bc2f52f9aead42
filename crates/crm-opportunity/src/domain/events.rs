//! Domain events for the Opportunity context.

use chrono::{DateTime, Utc};
use crm_core::error::DomainError;
use crm_core::event::{EventPayload, decode_payload, encode_payload, ensure_schema_version};
use crm_core::source::{ExternalSystem, FieldMask, SourceFields};
use serde::{Deserialize, Serialize};

/// An opportunity was created.
pub const OPPORTUNITY_CREATE_V1: &str = "V1_OPPORTUNITY_CREATE";
/// An opportunity's commercial fields changed.
pub const OPPORTUNITY_UPDATE_V1: &str = "V1_OPPORTUNITY_UPDATE";
/// A renewal opportunity was created for a contract.
pub const OPPORTUNITY_CREATE_RENEWAL_V1: &str = "V1_OPPORTUNITY_CREATE_RENEWAL";
/// A renewal opportunity's renewal fields changed.
pub const OPPORTUNITY_UPDATE_RENEWAL_V1: &str = "V1_OPPORTUNITY_UPDATE_RENEWAL";
/// A renewal moved to its next cycle.
pub const OPPORTUNITY_UPDATE_NEXT_CYCLE_DATE_V1: &str = "V1_OPPORTUNITY_UPDATE_NEXT_CYCLE_DATE";
/// An opportunity was closed as won.
pub const OPPORTUNITY_CLOSE_WIN_V1: &str = "V1_OPPORTUNITY_CLOSE_WIN";
/// An opportunity was closed as lost.
pub const OPPORTUNITY_CLOSE_LOOSE_V1: &str = "V1_OPPORTUNITY_CLOSE_LOOSE";

// Field mask names.
/// Mask name of [`OpportunityDetails::name`].
pub const FIELD_NAME: &str = "name";
/// Mask name of the amount.
pub const FIELD_AMOUNT: &str = "amount";
/// Mask name of [`OpportunityDetails::max_amount`].
pub const FIELD_MAX_AMOUNT: &str = "maxAmount";
/// Mask name of renewal comments.
pub const FIELD_COMMENTS: &str = "comments";
/// Mask name of the renewal likelihood.
pub const FIELD_RENEWAL_LIKELIHOOD: &str = "renewalLikelihood";
/// Mask name of the renewal date.
pub const FIELD_RENEWED_AT: &str = "renewedAt";
/// Mask name of the renewal adjusted rate.
pub const FIELD_ADJUSTED_RATE: &str = "adjustedRate";
/// Mask name of [`OpportunityDetails::external_type`].
pub const FIELD_EXTERNAL_TYPE: &str = "externalType";
/// Mask name of [`OpportunityDetails::external_stage`].
pub const FIELD_EXTERNAL_STAGE: &str = "externalStage";
/// Mask name of [`OpportunityDetails::internal_stage`].
pub const FIELD_INTERNAL_STAGE: &str = "internalStage";
/// Mask name of [`OpportunityDetails::estimated_closed_at`].
pub const FIELD_ESTIMATED_CLOSED_AT: &str = "estimatedClosedAt";
/// Mask name of the owner.
pub const FIELD_OWNER_USER_ID: &str = "ownerUserId";
/// Mask name of [`OpportunityDetails::currency`].
pub const FIELD_CURRENCY: &str = "currency";
/// Mask name of [`OpportunityDetails::next_steps`].
pub const FIELD_NEXT_STEPS: &str = "nextSteps";
/// Mask name of [`OpportunityDetails::likelihood_rate`].
pub const FIELD_LIKELIHOOD_RATE: &str = "likelihoodRate";

/// Kind of deal an opportunity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InternalType {
    /// New business opportunity.
    Nbo,
    /// More of what the customer already buys.
    Upsell,
    /// A different product for an existing customer.
    CrossSell,
    /// Renewal of an existing contract.
    Renewal,
}

/// Pipeline stage as tracked by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InternalStage {
    /// Still being worked.
    Open,
    /// Closed as won.
    ClosedWon,
    /// Closed as lost.
    ClosedLost,
}

/// How likely a renewal is to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenewalLikelihood {
    /// Expected to renew.
    High,
    /// Could go either way.
    Medium,
    /// Unlikely to renew.
    Low,
    /// Will not renew.
    Zero,
}

/// Commercial fields shared by create and update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpportunityDetails {
    /// Display name.
    pub name: String,
    /// Expected deal value.
    pub amount: f64,
    /// Upper bound of the deal value.
    pub max_amount: f64,
    /// Kind of deal.
    pub internal_type: Option<InternalType>,
    /// Deal type as named by the external system.
    pub external_type: String,
    /// Pipeline stage.
    pub internal_stage: Option<InternalStage>,
    /// Pipeline stage as named by the external system.
    pub external_stage: String,
    /// Expected close date.
    pub estimated_closed_at: Option<DateTime<Utc>>,
    /// User who owns the deal.
    pub owner_user_id: String,
    /// User who created the deal.
    pub created_by_user_id: String,
    /// Free-form notes.
    pub general_notes: String,
    /// Agreed next steps.
    pub next_steps: String,
    /// Organization the deal is with.
    pub organization_id: String,
    /// ISO currency code of the amounts.
    pub currency: String,
    /// Probability of closing, in percent.
    pub likelihood_rate: i64,
}

/// Emitted when an opportunity is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityCreated {
    /// Initial commercial fields.
    #[serde(flatten)]
    pub details: OpportunityDetails,
    /// Where the opportunity came from.
    pub source: SourceFields,
    /// Link to the external system that holds the deal, if any.
    #[serde(default)]
    pub external_system: Option<ExternalSystem>,
    /// When the opportunity was created.
    pub created_at: DateTime<Utc>,
    /// When the opportunity was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when an opportunity's commercial fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityUpdated {
    /// New values; only masked fields apply.
    #[serde(flatten)]
    pub details: OpportunityDetails,
    /// Source of the change.
    pub source: String,
    /// Link to the external system that holds the deal, if any.
    #[serde(default)]
    pub external_system: Option<ExternalSystem>,
    /// When the change happened.
    pub updated_at: DateTime<Utc>,
    /// Fields the update touches; empty means all.
    #[serde(default)]
    pub fields_mask: FieldMask,
}

/// Emitted when a renewal opportunity is created for a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalOpportunityCreated {
    /// Contract being renewed.
    pub contract_id: String,
    /// Pipeline stage.
    pub internal_stage: InternalStage,
    /// Normalized renewal likelihood.
    pub renewal_likelihood: RenewalLikelihood,
    /// Whether the renewal was approved.
    pub renewal_approved: bool,
    /// Date of the next renewal.
    pub renewed_at: Option<DateTime<Utc>>,
    /// Adjusted renewal rate, clamped to 0..=100.
    pub renewal_adjusted_rate: i64,
    /// Where the opportunity came from.
    pub source: SourceFields,
    /// When the opportunity was created.
    pub created_at: DateTime<Utc>,
    /// When the opportunity was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when a renewal opportunity's renewal fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalOpportunityUpdated {
    /// Normalized renewal likelihood.
    pub renewal_likelihood: RenewalLikelihood,
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
    /// User who made the change.
    pub updated_by_user_id: String,
    /// Source of the change.
    pub source: String,
    /// When the change happened.
    pub updated_at: DateTime<Utc>,
    /// Fields the update touches; empty means all.
    #[serde(default)]
    pub fields_mask: FieldMask,
}

/// Emitted when a renewal rolls into its next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextCycleDateUpdated {
    /// Date of the next renewal.
    pub renewed_at: Option<DateTime<Utc>>,
    /// When the change happened.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when an opportunity is closed, won or lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityClosed {
    /// When the deal closed.
    pub closed_at: DateTime<Utc>,
    /// When the change happened.
    pub updated_at: DateTime<Utc>,
}

/// Every event an opportunity stream may contain.
#[derive(Debug, Clone, PartialEq)]
pub enum OpportunityEvent {
    /// An opportunity was created.
    Created(OpportunityCreated),
    /// Commercial fields changed.
    Updated(OpportunityUpdated),
    /// A renewal opportunity was created.
    RenewalCreated(RenewalOpportunityCreated),
    /// Renewal fields changed.
    RenewalUpdated(RenewalOpportunityUpdated),
    /// The renewal moved to its next cycle.
    NextCycleDateUpdated(NextCycleDateUpdated),
    /// The deal was won.
    ClosedWon(OpportunityClosed),
    /// The deal was lost.
    ClosedLost(OpportunityClosed),
}

impl EventPayload for OpportunityEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => OPPORTUNITY_CREATE_V1,
            Self::Updated(_) => OPPORTUNITY_UPDATE_V1,
            Self::RenewalCreated(_) => OPPORTUNITY_CREATE_RENEWAL_V1,
            Self::RenewalUpdated(_) => OPPORTUNITY_UPDATE_RENEWAL_V1,
            Self::NextCycleDateUpdated(_) => OPPORTUNITY_UPDATE_NEXT_CYCLE_DATE_V1,
            Self::ClosedWon(_) => OPPORTUNITY_CLOSE_WIN_V1,
            Self::ClosedLost(_) => OPPORTUNITY_CLOSE_LOOSE_V1,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) => encode_payload(p),
            Self::Updated(p) => encode_payload(p),
            Self::RenewalCreated(p) => encode_payload(p),
            Self::RenewalUpdated(p) => encode_payload(p),
            Self::NextCycleDateUpdated(p) => encode_payload(p),
            Self::ClosedWon(p) | Self::ClosedLost(p) => encode_payload(p),
        }
    }

    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError> {
        ensure_schema_version(event_type, schema_version, 1)?;
        Ok(match event_type {
            OPPORTUNITY_CREATE_V1 => Self::Created(decode_payload(event_type, payload)?),
            OPPORTUNITY_UPDATE_V1 => Self::Updated(decode_payload(event_type, payload)?),
            OPPORTUNITY_CREATE_RENEWAL_V1 => {
                Self::RenewalCreated(decode_payload(event_type, payload)?)
            }
            OPPORTUNITY_UPDATE_RENEWAL_V1 => {
                Self::RenewalUpdated(decode_payload(event_type, payload)?)
            }
            OPPORTUNITY_UPDATE_NEXT_CYCLE_DATE_V1 => {
                Self::NextCycleDateUpdated(decode_payload(event_type, payload)?)
            }
            OPPORTUNITY_CLOSE_WIN_V1 => Self::ClosedWon(decode_payload(event_type, payload)?),
            OPPORTUNITY_CLOSE_LOOSE_V1 => Self::ClosedLost(decode_payload(event_type, payload)?),
            other => return Err(DomainError::UnsupportedEventType(other.to_owned())),
        })
    }
}
