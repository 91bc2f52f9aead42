//! Domain events for the Issue context.

use chrono::{DateTime, Utc};
use crm_core::error::DomainError;
use crm_core::event::{EventPayload, decode_payload, encode_payload, ensure_schema_version};
use crm_core::source::{ExternalSystem, SourceFields};
use serde::{Deserialize, Serialize};

/// An issue was created.
pub const ISSUE_CREATE_V1: &str = "V1_ISSUE_CREATE";
/// An issue changed.
pub const ISSUE_UPDATE_V1: &str = "V1_ISSUE_UPDATE";
/// An issue gained an assignee.
pub const ISSUE_ADD_USER_ASSIGNEE_V1: &str = "V1_ISSUE_ADD_USER_ASSIGNEE";
/// An issue lost an assignee.
pub const ISSUE_REMOVE_USER_ASSIGNEE_V1: &str = "V1_ISSUE_REMOVE_USER_ASSIGNEE";
/// An issue gained a follower.
pub const ISSUE_ADD_USER_FOLLOWER_V1: &str = "V1_ISSUE_ADD_USER_FOLLOWER";
/// An issue lost a follower.
pub const ISSUE_REMOVE_USER_FOLLOWER_V1: &str = "V1_ISSUE_REMOVE_USER_FOLLOWER";

/// Descriptive fields of an issue, subject to source-of-truth precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IssueDetails {
    /// One-line summary.
    pub subject: String,
    /// Free-form description.
    pub description: String,
    /// Workflow status.
    pub status: String,
    /// Priority label.
    pub priority: String,
}

/// Emitted when an issue is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCreated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: IssueDetails,
    /// Organization that reported the issue.
    #[serde(default)]
    pub reported_by_organization_id: String,
    /// Organization that submitted the issue.
    #[serde(default)]
    pub submitted_by_organization_id: String,
    /// User who submitted the issue.
    #[serde(default)]
    pub submitted_by_user_id: String,
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

/// Emitted when issue fields change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdated {
    /// Field values carried by the event.
    #[serde(flatten)]
    pub details: IssueDetails,
    /// Where the data came from.
    pub source: String,
    /// Link to the external system that holds the record, if any.
    #[serde(default)]
    pub external_system: Option<ExternalSystem>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

/// A user linked to or unlinked from an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUserLink {
    /// The user being linked or unlinked.
    pub user_id: String,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Every event an issue stream may contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueEvent {
    /// The record was created.
    Created(IssueCreated),
    /// Fields changed.
    Updated(IssueUpdated),
    /// A user was assigned.
    AssigneeAdded(IssueUserLink),
    /// A user was unassigned.
    AssigneeRemoved(IssueUserLink),
    /// A user started following.
    FollowerAdded(IssueUserLink),
    /// A user stopped following.
    FollowerRemoved(IssueUserLink),
}

impl EventPayload for IssueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => ISSUE_CREATE_V1,
            Self::Updated(_) => ISSUE_UPDATE_V1,
            Self::AssigneeAdded(_) => ISSUE_ADD_USER_ASSIGNEE_V1,
            Self::AssigneeRemoved(_) => ISSUE_REMOVE_USER_ASSIGNEE_V1,
            Self::FollowerAdded(_) => ISSUE_ADD_USER_FOLLOWER_V1,
            Self::FollowerRemoved(_) => ISSUE_REMOVE_USER_FOLLOWER_V1,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) => encode_payload(p),
            Self::Updated(p) => encode_payload(p),
            Self::AssigneeAdded(p)
            | Self::AssigneeRemoved(p)
            | Self::FollowerAdded(p)
            | Self::FollowerRemoved(p) => encode_payload(p),
        }
    }

    fn decode(
        event_type: &str,
        schema_version: i32,
        payload: &serde_json::Value,
    ) -> Result<Self, DomainError> {
        ensure_schema_version(event_type, schema_version, 1)?;
        Ok(match event_type {
            ISSUE_CREATE_V1 => Self::Created(decode_payload(event_type, payload)?),
            ISSUE_UPDATE_V1 => Self::Updated(decode_payload(event_type, payload)?),
            ISSUE_ADD_USER_ASSIGNEE_V1 => Self::AssigneeAdded(decode_payload(event_type, payload)?),
            ISSUE_REMOVE_USER_ASSIGNEE_V1 => {
                Self::AssigneeRemoved(decode_payload(event_type, payload)?)
            }
            ISSUE_ADD_USER_FOLLOWER_V1 => Self::FollowerAdded(decode_payload(event_type, payload)?),
            ISSUE_REMOVE_USER_FOLLOWER_V1 => {
                Self::FollowerRemoved(decode_payload(event_type, payload)?)
            }
            other => return Err(DomainError::UnsupportedEventType(other.to_owned())),
        })
    }
}
