//! Domain events for the Contact context.

use chrono::{DateTime, Utc};
use crm_core::error::DomainError;
use crm_core::event::{EventPayload, decode_payload, encode_payload, ensure_schema_version};
use crm_core::source::{ExternalSystem, FieldMask, SourceFields};
use serde::{Deserialize, Serialize};

/// A contact was created.
pub const CONTACT_CREATE_V1: &str = "V1_CONTACT_CREATE";
/// A contact changed.
pub const CONTACT_UPDATE_V1: &str = "V1_CONTACT_UPDATE";

/// Mask name of the `firstName` field.
pub const FIELD_FIRST_NAME: &str = "firstName";
/// Mask name of the `lastName` field.
pub const FIELD_LAST_NAME: &str = "lastName";
/// Mask name of the `name` field.
pub const FIELD_NAME: &str = "name";
/// Mask name of the `prefix` field.
pub const FIELD_PREFIX: &str = "prefix";
/// Mask name of the `description` field.
pub const FIELD_DESCRIPTION: &str = "description";
/// Mask name of the `timezone` field.
pub const FIELD_TIMEZONE: &str = "timezone";
/// Mask name of the `profilePhotoUrl` field.
pub const FIELD_PROFILE_PHOTO_URL: &str = "profilePhotoUrl";
/// Mask name of the `username` field.
pub const FIELD_USERNAME: &str = "username";

/// Descriptive fields of a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactDetails {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Display name.
    pub name: String,
    /// Honorific, such as "Dr".
    pub prefix: String,
    /// Free-form description.
    pub description: String,
    /// IANA time zone name.
    pub timezone: String,
    /// URL of the profile photo.
    pub profile_photo_url: String,
    /// Login or handle.
    pub username: String,
}

/// Emitted when a contact is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCreated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: ContactDetails,
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

/// Emitted when contact fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: ContactDetails,
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

/// Every event a contact stream may contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactEvent {
    /// The record was created.
    Created(ContactCreated),
    /// Fields changed.
    Updated(ContactUpdated),
}

impl EventPayload for ContactEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => CONTACT_CREATE_V1,
            Self::Updated(_) => CONTACT_UPDATE_V1,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) => encode_payload(p),
            Self::Updated(p) => encode_payload(p),
        }
    }

    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError> {
        ensure_schema_version(event_type, schema_version, 1)?;
        match event_type {
            CONTACT_CREATE_V1 => Ok(Self::Created(decode_payload(event_type, payload)?)),
            CONTACT_UPDATE_V1 => Ok(Self::Updated(decode_payload(event_type, payload)?)),
            other => Err(DomainError::UnsupportedEventType(other.to_owned())),
        }
    }
}
