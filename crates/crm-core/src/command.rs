//! Command abstractions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::EventMetadata;
use crate::source::SourceFields;

/// Fields every command carries, filled by the command source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseCommand {
    /// Tenant the target aggregate belongs to.
    pub tenant: String,
    /// Target aggregate id; may be empty for create commands.
    pub object_id: String,
    /// User issuing the command.
    pub logged_in_user_id: String,
    /// Application issuing the command.
    pub app_source: String,
    /// Correlation ID to trace this command through the system.
    pub correlation_id: Uuid,
}

impl BaseCommand {
    /// Creates a base command for `tenant` and `object_id` with a fresh
    /// correlation id.
    #[must_use]
    pub fn new(tenant: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            object_id: object_id.into(),
            correlation_id: Uuid::new_v4(),
            ..Self::default()
        }
    }

    /// Sets the issuing user.
    #[must_use]
    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.logged_in_user_id = user_id.into();
        self
    }

    /// Sets the issuing application.
    #[must_use]
    pub fn from_app(mut self, app_source: impl Into<String>) -> Self {
        self.app_source = app_source.into();
        self
    }

    /// Structural validation shared by every command.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tenant is missing, or if the
    /// object id is missing and `object_id_required` is set.
    pub fn validate(&self, object_id_required: bool) -> Result<(), DomainError> {
        if self.tenant.trim().is_empty() {
            return Err(DomainError::Validation("tenant is required".into()));
        }
        if object_id_required && self.object_id.trim().is_empty() {
            return Err(DomainError::Validation("object id is required".into()));
        }
        Ok(())
    }

    /// Completes `source` for an event raised by this command: a blank app
    /// source is taken from the command, remaining blanks get defaults.
    #[must_use]
    pub fn source_fields(&self, source: &SourceFields) -> SourceFields {
        let mut source = source.clone();
        if source.app_source.is_empty() {
            source.app_source.clone_from(&self.app_source);
        }
        source.with_defaults()
    }

    /// Builds the metadata stamped on events raised by this command.
    #[must_use]
    pub fn event_metadata(&self) -> EventMetadata {
        EventMetadata {
            tenant: self.tenant.clone(),
            user_id: self.logged_in_user_id.clone(),
            app_source: self.app_source.clone(),
            correlation_id: self.correlation_id,
            causation_id: self.correlation_id,
        }
    }
}

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Shared command fields.
    fn base(&self) -> &BaseCommand;

    /// Whether this command may target an aggregate that does not exist yet.
    fn creates_aggregate(&self) -> bool {
        false
    }

    /// Structural validation run before any I/O.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first problem found.
    fn validate(&self) -> Result<(), DomainError> {
        self.base().validate(!self.creates_aggregate())
    }

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid {
        self.base().correlation_id
    }
}

/// Returns `value` unless it is blank, in which case a validation error naming
/// `field` is returned.
///
/// # Errors
///
/// Returns `DomainError::Validation` for blank values.
pub fn require_non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_tenant() {
        let command = BaseCommand::new("", "u-1");

        match command.validate(true) {
            Err(DomainError::Validation(msg)) => assert_eq!(msg, "tenant is required"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_allows_empty_object_id_for_create() {
        let command = BaseCommand::new("acme", "");

        assert!(command.validate(false).is_ok());
        assert!(command.validate(true).is_err());
    }

    #[test]
    fn test_source_fields_prefers_command_app_source() {
        let command = BaseCommand::new("acme", "u-1").from_app("web");

        let source = command.source_fields(&SourceFields {
            source: "hubspot".into(),
            ..SourceFields::default()
        });

        assert_eq!(source.source, "hubspot");
        assert_eq!(source.source_of_truth, "hubspot");
        assert_eq!(source.app_source, "web");
    }

    #[test]
    fn test_event_metadata_copies_command_identity() {
        let command = BaseCommand::new("acme", "u-1")
            .by_user("admin")
            .from_app("web");

        let metadata = command.event_metadata();

        assert_eq!(metadata.tenant, "acme");
        assert_eq!(metadata.user_id, "admin");
        assert_eq!(metadata.app_source, "web");
        assert_eq!(metadata.correlation_id, command.correlation_id);
    }
}
