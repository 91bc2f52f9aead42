//! Domain events for the User context.

use chrono::{DateTime, Utc};
use crm_core::error::DomainError;
use crm_core::event::{EventPayload, decode_payload, encode_payload, ensure_schema_version};
use crm_core::source::{ExternalSystem, SourceFields};
use serde::{Deserialize, Serialize};

/// An user was created.
pub const USER_CREATE_V1: &str = "V1_USER_CREATE";
/// An user changed.
pub const USER_UPDATE_V1: &str = "V1_USER_UPDATE";
/// An user was granted a role.
pub const USER_ADD_ROLE_V1: &str = "V1_USER_ADD_ROLE";
/// An user had a role revoked.
pub const USER_REMOVE_ROLE_V1: &str = "V1_USER_REMOVE_ROLE";

/// Profile fields of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDetails {
    /// Display name.
    pub name: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Users of the tenant's own organization.
    pub internal: bool,
    /// Whether the user is an automated account.
    pub bot: bool,
    /// URL of the profile photo.
    pub profile_photo_url: String,
    /// IANA time zone name.
    pub timezone: String,
}

/// Emitted when a user is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: UserDetails,
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

/// Emitted when user fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: UserDetails,
    /// Where the data came from.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    #[serde(default)]
    pub external_system: Option<ExternalSystem>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when a role is granted or revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChanged {
    /// The role being granted or revoked.
    pub role: String,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Every event a user stream may contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// The record was created.
    Created(UserCreated),
    /// Fields changed.
    Updated(UserUpdated),
    /// A role was granted.
    RoleAdded(RoleChanged),
    /// A role was revoked.
    RoleRemoved(RoleChanged),
}

impl EventPayload for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => USER_CREATE_V1,
            Self::Updated(_) => USER_UPDATE_V1,
            Self::RoleAdded(_) => USER_ADD_ROLE_V1,
            Self::RoleRemoved(_) => USER_REMOVE_ROLE_V1,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) => encode_payload(p),
            Self::Updated(p) => encode_payload(p),
            Self::RoleAdded(p) | Self::RoleRemoved(p) => encode_payload(p),
        }
    }

    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError> {
        ensure_schema_version(event_type, schema_version, 1)?;
        match event_type {
            USER_CREATE_V1 => Ok(Self::Created(decode_payload(event_type, payload)?)),
            USER_UPDATE_V1 => Ok(Self::Updated(decode_payload(event_type, payload)?)),
            USER_ADD_ROLE_V1 => Ok(Self::RoleAdded(decode_payload(event_type, payload)?)),
            USER_REMOVE_ROLE_V1 => Ok(Self::RoleRemoved(decode_payload(event_type, payload)?)),
            other => Err(DomainError::UnsupportedEventType(other.to_owned())),
        }
    }
}
