//! Command handlers for the Contact context.

use crm_core::error::DomainError;
use crm_core::handler::{CommandHandler, CommandOutcome};
use tracing::instrument;

use crate::domain::aggregates::Contact;
use crate::domain::commands::{CreateContact, UpdateContact};

/// Handles the `CreateContact` command. A missing object id gets a fresh
/// contact id, returned in the outcome.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the tenant is missing or the contact
/// already exists, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant))]
pub async fn handle_create_contact(
    command: &CreateContact,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Contact, _>(command).await
}

/// Handles the `UpdateContact` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the contact does not exist, or
/// any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, contact_id = %command.base.object_id))]
pub async fn handle_update_contact(
    command: &UpdateContact,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Contact, _>(command).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crm_core::command::BaseCommand;
    use crm_core::error::DomainError;
    use crm_core::handler::{CommandHandler, RetryPolicy};
    use crm_core::store::AggregateStore;
    use crm_test_support::{
        ConflictingEventRepository, FailingEventRepository, FixedClock, RecordingEventRepository,
    };

    use super::*;
    use crate::domain::events::ContactDetails;

    fn create_command() -> CreateContact {
        CreateContact {
            base: BaseCommand::new("acme", "c-1").by_user("u-1").from_app("web"),
            details: ContactDetails {
                first_name: "Ada".into(),
                ..ContactDetails::default()
            },
            ..CreateContact::default()
        }
    }

    #[tokio::test]
    async fn test_handle_create_contact_persists_contact_created_event() {
        // Arrange
        let repo = Arc::new(RecordingEventRepository::new(Vec::new()));
        let handler = CommandHandler::new(
            AggregateStore::new(repo.clone()),
            Arc::new(FixedClock::default_instant()),
        );
        let command = create_command();

        // Act
        let outcome = handle_create_contact(&command, &handler).await.unwrap();

        // Assert
        assert_eq!(outcome.aggregate_id, "c-1");
        assert_eq!(outcome.attempts, 1);
        let appended = repo.appended_events();
        let (_, expected_version, events) = &appended[0];
        assert_eq!(*expected_version, 0);
        let stored = &events[0];
        assert_eq!(stored.event_type, "V1_CONTACT_CREATE");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.payload["firstName"], "Ada");
        assert_eq!(stored.payload["source"]["appSource"], "web");
        assert_eq!(stored.metadata.user_id, "u-1");
        assert_eq!(stored.occurred_at, FixedClock::default_instant().0);
    }

    #[tokio::test]
    async fn test_handle_create_contact_retries_after_conflict() {
        // Arrange
        let repo = Arc::new(ConflictingEventRepository::new(
            RecordingEventRepository::new(Vec::new()),
            2,
        ));
        let handler = CommandHandler::new(
            AggregateStore::new(repo.clone()),
            Arc::new(FixedClock::default_instant()),
        )
        .with_retry_policy(RetryPolicy {
            min_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
            ..RetryPolicy::default()
        });

        // Act
        let outcome = handle_create_contact(&create_command(), &handler)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.attempts, 3);
        assert_eq!(repo.append_attempts(), 3);
        assert_eq!(repo.inner().appended_events().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_update_contact_propagates_store_errors() {
        let handler = CommandHandler::new(
            AggregateStore::new(Arc::new(FailingEventRepository)),
            Arc::new(FixedClock::default_instant()),
        );
        let command = UpdateContact {
            base: BaseCommand::new("acme", "c-1"),
            ..UpdateContact::default()
        };

        let result = handle_update_contact(&command, &handler).await;

        match result {
            Err(DomainError::Infrastructure(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }
}
