//! Data provenance and update precedence.
//!
//! Every CRM entity remembers which system is its source of truth. Updates
//! arriving from a different system than the internal one may only fill gaps
//! while the internal system owns the entity; everything else overwrites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source name of data entered through the platform itself.
pub const INTERNAL_SOURCE: &str = "openline";

/// App source stamped when a command does not name one.
pub const DEFAULT_APP_SOURCE: &str = "event-processing-platform";

/// Returns `source`, or the internal source when it is blank.
#[must_use]
pub fn source_or_internal(source: &str) -> String {
    if source.is_empty() {
        INTERNAL_SOURCE.to_owned()
    } else {
        source.to_owned()
    }
}

/// Provenance of an entity or of an incoming change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceFields {
    /// System the data came from.
    pub source: String,
    /// System currently authoritative for the entity.
    pub source_of_truth: String,
    /// Application that submitted the data.
    pub app_source: String,
}

impl SourceFields {
    /// Creates source fields for data coming from `source`, filling defaults.
    #[must_use]
    pub fn new(source: impl Into<String>, app_source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_of_truth: String::new(),
            app_source: app_source.into(),
        }
        .with_defaults()
    }

    /// Fills blank fields: source defaults to the internal source, source of
    /// truth to the source, app source to [`DEFAULT_APP_SOURCE`].
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.source.is_empty() {
            self.source = INTERNAL_SOURCE.to_owned();
        }
        if self.source_of_truth.is_empty() {
            self.source_of_truth.clone_from(&self.source);
        }
        if self.app_source.is_empty() {
            self.app_source = DEFAULT_APP_SOURCE.to_owned();
        }
        self
    }

    /// Decides how an update from `incoming` applies to an entity with these
    /// source fields, and records the resulting source of truth.
    pub fn resolve_update(&mut self, incoming: &str) -> Precedence {
        let incoming = if incoming.is_empty() {
            INTERNAL_SOURCE
        } else {
            incoming
        };
        if incoming == INTERNAL_SOURCE {
            self.source_of_truth = INTERNAL_SOURCE.to_owned();
        }
        if incoming != self.source_of_truth && self.source_of_truth == INTERNAL_SOURCE {
            Precedence::FillEmpty
        } else {
            self.source_of_truth = incoming.to_owned();
            Precedence::Overwrite
        }
    }
}

/// How an update's field values are merged into existing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// Every selected field is written.
    Overwrite,
    /// Only fields that are currently empty are written.
    FillEmpty,
}

impl Precedence {
    /// Merges a string field.
    pub fn merge_str(self, current: &mut String, incoming: &str) {
        if self == Self::Overwrite || current.is_empty() {
            incoming.clone_into(current);
        }
    }

    /// Merges an optional field; `None` counts as empty.
    pub fn merge_opt<T: Clone>(self, current: &mut Option<T>, incoming: Option<&T>) {
        if self == Self::Overwrite || current.is_none() {
            *current = incoming.cloned();
        }
    }
}

/// Names of the fields an update touches. An empty mask selects every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMask(Vec<String>);

impl FieldMask {
    /// Selects every field.
    #[must_use]
    pub fn all() -> Self {
        Self(Vec::new())
    }

    /// Selects exactly `fields`.
    #[must_use]
    pub fn of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if `field` is selected.
    #[must_use]
    pub fn includes(&self, field: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|f| f == field)
    }
}

/// Reference to the same entity in an external system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSystem {
    /// External system name (e.g. `"hubspot"`).
    pub external_system_id: String,
    /// Entity id within the external system.
    pub external_id: String,
    /// Link to the entity in the external system.
    #[serde(default)]
    pub external_url: String,
    /// Source object type within the external system.
    #[serde(default)]
    pub external_source: String,
    /// When the entity was last synced.
    #[serde(default)]
    pub sync_date: Option<DateTime<Utc>>,
}

impl ExternalSystem {
    /// A reference is usable only when both system and id are known.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !self.external_system_id.is_empty() && !self.external_id.is_empty()
    }
}

/// Adds `incoming` to `systems`, replacing the entry for the same system and
/// external id. Unavailable references are ignored.
pub fn merge_external_system(systems: &mut Vec<ExternalSystem>, incoming: Option<&ExternalSystem>) {
    let Some(incoming) = incoming.filter(|s| s.is_available()) else {
        return;
    };
    match systems.iter_mut().find(|s| {
        s.external_system_id == incoming.external_system_id && s.external_id == incoming.external_id
    }) {
        Some(existing) => existing.clone_from(incoming),
        None => systems.push(incoming.clone()),
    }
}
