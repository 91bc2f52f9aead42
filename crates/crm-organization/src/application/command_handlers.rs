//! Command handlers for the Organization context.

use crm_core::error::DomainError;
use crm_core::handler::{CommandHandler, CommandOutcome};
use crm_dispatch::outbox::EventOutbox;
use tracing::{error, instrument};

use crate::application::owner_notification::notify_owner_update;
use crate::domain::aggregates::Organization;
use crate::domain::commands::{CreateOrganization, UpdateOrganization, UpdateOrganizationOwner};

/// Handles the `CreateOrganization` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the tenant is missing or the
/// organization already exists, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant))]
pub async fn handle_create_organization(
    command: &CreateOrganization,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Organization, _>(command).await
}

/// Handles the `UpdateOrganization` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the organization does not
/// exist, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, organization_id = %command.base.object_id))]
pub async fn handle_update_organization(
    command: &UpdateOrganization,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Organization, _>(command).await
}

/// Handles the `UpdateOrganizationOwner` command and buffers the owner
/// notification for a committed change.
///
/// The owner change is committed before the notification is buffered; a
/// buffering failure is logged and does not fail the command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the organization does not
/// exist, `DomainError::Validation` for a blank owner, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, organization_id = %command.base.object_id))]
pub async fn handle_update_organization_owner(
    command: &UpdateOrganizationOwner,
    handler: &CommandHandler,
    outbox: &EventOutbox,
) -> Result<CommandOutcome, DomainError> {
    let outcome = handler.handle::<Organization, _>(command).await?;
    if let Err(err) = notify_owner_update(&outcome.events, outbox, handler.clock()).await {
        error!(error = %err, "buffering owner notification failed");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crm_core::command::BaseCommand;
    use crm_core::event::StreamId;
    use crm_core::repository::StoredEvent;
    use crm_core::store::AggregateStore;
    use crm_event_store::memory::InMemoryEventBufferRepository;
    use crm_test_support::{
        EmptyEventRepository, FixedClock, RecordingEventRepository, stored_event,
    };

    use super::*;
    use crate::application::owner_notification::owner_notification_delay;
    use crate::domain::events::ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1;

    fn history() -> Vec<StoredEvent> {
        let stream = StreamId::new("acme", "organization", "org-1");
        vec![stored_event(
            &stream,
            1,
            "V1_ORGANIZATION_CREATE",
            serde_json::json!({
                "name": "Initech",
                "source": {"source": "openline"},
                "createdAt": "2026-01-01T00:00:00Z",
                "updatedAt": "2026-01-01T00:00:00Z"
            }),
        )]
    }

    #[tokio::test]
    async fn test_owner_change_buffers_notification() {
        // Arrange
        let repo = Arc::new(RecordingEventRepository::new(history()));
        let clock = Arc::new(FixedClock::default_instant());
        let handler = CommandHandler::new(AggregateStore::new(repo.clone()), clock.clone());
        let buffer = Arc::new(InMemoryEventBufferRepository::new());
        let outbox = EventOutbox::new(buffer.clone(), clock.clone());
        let command = UpdateOrganizationOwner {
            base: BaseCommand::new("acme", "org-1").by_user("u-admin"),
            owner_user_id: "u-9".into(),
        };

        // Act
        let outcome = handle_update_organization_owner(&command, &handler, &outbox)
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type, "V1_ORGANIZATION_UPDATE_OWNER");
        let entries = buffer.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, ORGANIZATION_UPDATE_OWNER_NOTIFICATION_V1);
        assert_eq!(entries[0].expires_at, clock.0 + owner_notification_delay());
        let buffered = entries[0].event().unwrap();
        assert_eq!(buffered.version, 3);
        assert_eq!(buffered.payload["ownerUserId"], "u-9");
        assert_eq!(buffered.payload["actorUserId"], "u-admin");
        assert_eq!(buffered.payload["organizationId"], "org-1");
    }

    #[tokio::test]
    async fn test_unchanged_owner_buffers_nothing() {
        let stream = StreamId::new("acme", "organization", "org-1");
        let mut events = history();
        events.push(stored_event(
            &stream,
            2,
            "V1_ORGANIZATION_UPDATE_OWNER",
            serde_json::json!({"ownerUserId": "u-9", "updatedAt": "2026-01-02T00:00:00Z"}),
        ));
        let repo = Arc::new(RecordingEventRepository::new(events));
        let clock = Arc::new(FixedClock::default_instant());
        let handler = CommandHandler::new(AggregateStore::new(repo.clone()), clock.clone());
        let buffer = Arc::new(InMemoryEventBufferRepository::new());
        let outbox = EventOutbox::new(buffer.clone(), clock);
        let command = UpdateOrganizationOwner {
            base: BaseCommand::new("acme", "org-1"),
            owner_user_id: "u-9".into(),
        };

        let outcome = handle_update_organization_owner(&command, &handler, &outbox)
            .await
            .unwrap();

        assert!(outcome.events.is_empty());
        assert!(buffer.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_organization_on_missing_organization_returns_not_found() {
        let handler = CommandHandler::new(
            AggregateStore::new(Arc::new(EmptyEventRepository)),
            Arc::new(FixedClock::default_instant()),
        );
        let command = UpdateOrganization {
            base: BaseCommand::new("acme", "org-404"),
            ..UpdateOrganization::default()
        };

        let result = handle_update_organization(&command, &handler).await;

        match result {
            Err(DomainError::AggregateNotFound(stream)) => {
                assert_eq!(stream.aggregate_id, "org-404");
            }
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }
}
