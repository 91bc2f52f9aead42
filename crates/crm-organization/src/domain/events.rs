//! Domain events for the Organization context.

use chrono::{DateTime, Utc};
use crm_core::error::DomainError;
use crm_core::event::{EventPayload, decode_payload, encode_payload, ensure_schema_version};
use crm_core::source::{ExternalSystem, FieldMask, SourceFields};
use serde::{Deserialize, Serialize};

/// An organization was created.
pub const ORGANIZATION_CREATE_V1: &str = "V1_ORGANIZATION_CREATE";
/// An organization changed.
pub const ORGANIZATION_UPDATE_V1: &str = "V1_ORGANIZATION_UPDATE";
/// An organization changed owner.
pub const ORGANIZATION_UPDATE_OWNER_V1: &str = "V1_ORGANIZATION_UPDATE_OWNER";
/// Buffered after an owner change and never forwarded by the buffer
/// dispatcher.
pub const ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1: &str =
    "V1_ORGANIZATION_UPDATE_OWNER_NOTIFICATION";

/// Mask name of the `name` field.
pub const FIELD_NAME: &str = "name";
/// Mask name of the `description` field.
pub const FIELD_DESCRIPTION: &str = "description";
/// Mask name of the `website` field.
pub const FIELD_WEBSITE: &str = "website";
/// Mask name of the `industry` field.
pub const FIELD_INDUSTRY: &str = "industry";
/// Mask name of the `subIndustry` field.
pub const FIELD_SUB_INDUSTRY: &str = "subIndustry";
/// Mask name of the `market` field.
pub const FIELD_MARKET: &str = "market";
/// Mask name of the `targetAudience` field.
pub const FIELD_TARGET_AUDIENCE: &str = "targetAudience";
/// Mask name of the `valueProposition` field.
pub const FIELD_VALUE_PROPOSITION: &str = "valueProposition";
/// Mask name of the `employees` field.
pub const FIELD_EMPLOYEES: &str = "employees";
/// Mask name of the `isCustomer` field.
pub const FIELD_IS_CUSTOMER: &str = "isCustomer";
/// Mask name of the `hide` field.
pub const FIELD_HIDE: &str = "hide";

/// Descriptive fields of an organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationDetails {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Public website.
    pub website: String,
    /// Industry, as mapped by the adjuster.
    pub industry: String,
    /// Sub-industry.
    pub sub_industry: String,
    /// Market segment, such as "B2B".
    pub market: String,
    /// Who the organization sells to.
    pub target_audience: String,
    /// What it offers them.
    pub value_proposition: String,
    /// Head count.
    pub employees: i64,
    /// Whether the organization is a customer.
    pub is_customer: bool,
    /// Whether the organization is hidden from listings.
    pub hide: bool,
}

/// Emitted when an organization is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationCreated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: OrganizationDetails,
    /// Where the data came from.
    pub source: SourceFields,
    /// Link to the external system that holds the record, if any.
    #[serde(default)]
    pub external_system: Option<ExternalSystem>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when organization fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationUpdated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: OrganizationDetails,
    /// Where the data came from.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    #[serde(default)]
    pub external_system: Option<ExternalSystem>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
    /// Fields the update touches; empty means all.
    #[serde(default)]
    pub fields_mask: FieldMask,
}

/// Emitted when an organization changes hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerUpdated {
    /// The new owner.
    pub owner_user_id: String,
    /// User who made the change.
    #[serde(default)]
    pub actor_user_id: String,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Tells the new owner about the change. Only ever lives in the event buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerUpdateNotification {
    /// Organization whose owner changed.
    pub organization_id: String,
    /// The new owner.
    pub owner_user_id: String,
    /// User who made the change.
    #[serde(default)]
    pub actor_user_id: String,
    /// When ownership changed.
    pub owner_updated_at: DateTime<Utc>,
}

/// Every event an organization stream may contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizationEvent {
    /// The record was created.
    Created(OrganizationCreated),
    /// Fields changed.
    Updated(OrganizationUpdated),
    /// The owner changed.
    OwnerUpdated(OwnerUpdated),
    /// Notice to other contexts that the owner changed.
    OwnerUpdateNotification(OwnerUpdateNotification),
}

impl EventPayload for OrganizationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => ORGANIZATION_CREATE_V1,
            Self::Updated(_) => ORGANIZATION_UPDATE_V1,
            Self::OwnerUpdated(_) => ORGANIZATION_UPDATE_OWNER_V1,
            Self::OwnerUpdateNotification(_) => ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) => encode_payload(p),
            Self::Updated(p) => encode_payload(p),
            Self::OwnerUpdated(p) => encode_payload(p),
            Self::OwnerUpdateNotification(p) => encode_payload(p),
        }
    }

    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError> {
        ensure_schema_version(event_type, schema_version, 1)?;
        Ok(match event_type {
            ORGANIZATION_CREATE_V1 => Self::Created(decode_payload(event_type, payload)?),
            ORGANIZATION_UPDATE_V1 => Self::Updated(decode_payload(event_type, payload)?),
            ORGANIZATION_UPDATE_OWNER_V1 => {
                Self::OwnerUpdated(decode_payload(event_type, payload)?)
            }
            ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1 => {
                Self::OwnerUpdateNotification(decode_payload(event_type, payload)?)
            }
            other => return Err(DomainError::UnsupportedEventType(other.to_owned())),
        })
    }
}
