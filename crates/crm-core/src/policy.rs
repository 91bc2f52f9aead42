//! Event-type policies.
//!
//! Both policies are plain data so they can be loaded from configuration; the
//! `version` field identifies which revision of a policy is in force and is
//! logged wherever the policy changes behavior.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Event type of owner-change notifications, which are never forwarded from
/// the event buffer.
pub const ORGANIZATION_OWNER_NOTIFICATION: &str = "V1_ORGANIZATION_UPDATE_OWNER_NOTIFICATION";

/// Which stored event types are stream markers rather than domain events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTypePolicy {
    /// Policy revision.
    pub version: u32,
    /// Event types starting with one of these prefixes are internal markers.
    pub internal_prefixes: Vec<String>,
}

impl Default for EventTypePolicy {
    fn default() -> Self {
        Self {
            version: 1,
            internal_prefixes: vec!["$".to_owned()],
        }
    }
}

impl EventTypePolicy {
    /// Returns `true` for internal stream-marker event types.
    #[must_use]
    pub fn is_internal(&self, event_type: &str) -> bool {
        self.internal_prefixes
            .iter()
            .any(|prefix| event_type.starts_with(prefix.as_str()))
    }
}

/// Which event types the buffer dispatcher refuses to forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    /// Policy revision.
    pub version: u32,
    /// Event types that are never forwarded.
    pub denylist: BTreeSet<String>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            denylist: BTreeSet::from([ORGANIZATION_OWNER_NOTIFICATION.to_owned()]),
        }
    }
}

impl DispatchPolicy {
    /// Creates a policy denying exactly `event_types`.
    #[must_use]
    pub fn with_denylist<I, S>(version: u32, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version,
            denylist: event_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `event_type` must not be forwarded.
    #[must_use]
    pub fn is_denied(&self, event_type: &str) -> bool {
        self.denylist.contains(event_type)
    }
}
