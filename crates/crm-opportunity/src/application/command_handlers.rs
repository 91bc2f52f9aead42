//! Command handlers for the Opportunity context.
//!
//! Each handler runs its command through the shared [`CommandHandler`]:
//! validate, load the opportunity, apply the domain decision and persist the
//! resulting events with optimistic concurrency.

use crm_core::error::DomainError;
use crm_core::handler::{CommandHandler, CommandOutcome};
use tracing::instrument;

use crate::domain::aggregates::Opportunity;
use crate::domain::commands::{
    CloseLooseOpportunity, CloseWinOpportunity, CreateOpportunity, CreateRenewalOpportunity,
    UpdateOpportunity, UpdateRenewalOpportunity, UpdateRenewalOpportunityNextCycleDate,
};

/// Handles the `CreateOpportunity` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the command is malformed or the
/// opportunity already exists, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant))]
pub async fn handle_create_opportunity(
    command: &CreateOpportunity,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

/// Handles the `UpdateOpportunity` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the opportunity does not exist,
/// or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, opportunity_id = %command.base.object_id))]
pub async fn handle_update_opportunity(
    command: &UpdateOpportunity,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

/// Handles the `CreateRenewalOpportunity` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the contract id is missing or the
/// opportunity already exists, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, contract_id = %command.contract_id))]
pub async fn handle_create_renewal_opportunity(
    command: &CreateRenewalOpportunity,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

/// Handles the `UpdateRenewalOpportunity` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the opportunity does not
/// exist, `DomainError::Validation` if it is not a renewal, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, opportunity_id = %command.base.object_id))]
pub async fn handle_update_renewal_opportunity(
    command: &UpdateRenewalOpportunity,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

/// Handles the `UpdateRenewalOpportunityNextCycleDate` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the opportunity does not
/// exist, `DomainError::Validation` if it is not a renewal, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, opportunity_id = %command.base.object_id))]
pub async fn handle_update_renewal_opportunity_next_cycle_date(
    command: &UpdateRenewalOpportunityNextCycleDate,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

/// Handles the `CloseWinOpportunity` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the opportunity does not exist,
/// or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, opportunity_id = %command.base.object_id))]
pub async fn handle_close_win_opportunity(
    command: &CloseWinOpportunity,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

/// Handles the `CloseLooseOpportunity` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the opportunity does not exist,
/// or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, opportunity_id = %command.base.object_id))]
pub async fn handle_close_loose_opportunity(
    command: &CloseLooseOpportunity,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Opportunity, _>(command).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crm_core::command::BaseCommand;
    use crm_core::error::DomainError;
    use crm_core::event::StreamId;
    use crm_core::handler::CommandHandler;
    use crm_core::store::AggregateStore;
    use crm_test_support::{
        EmptyEventRepository, FixedClock, RecordingEventRepository, stored_event,
    };

    use crate::application::command_handlers::{
        handle_close_win_opportunity, handle_create_renewal_opportunity,
        handle_update_renewal_opportunity_next_cycle_date,
    };
    use crate::domain::commands::{
        CloseWinOpportunity, CreateRenewalOpportunity, UpdateRenewalOpportunityNextCycleDate,
    };

    fn handler(repo: Arc<RecordingEventRepository>) -> CommandHandler {
        CommandHandler::new(
            AggregateStore::new(repo),
            Arc::new(FixedClock::default_instant()),
        )
    }

    fn renewal_history(stream: &StreamId) -> Vec<crm_core::repository::StoredEvent> {
        vec![stored_event(
            stream,
            1,
            "V1_OPPORTUNITY_CREATE_RENEWAL",
            serde_json::json!({
                "contractId": "c-1",
                "internalStage": "OPEN",
                "renewalLikelihood": "HIGH",
                "renewalApproved": false,
                "renewedAt": null,
                "renewalAdjustedRate": 100,
                "source": {"source": "openline", "sourceOfTruth": "openline", "appSource": "web"},
                "createdAt": "2026-01-01T00:00:00Z",
                "updatedAt": "2026-01-01T00:00:00Z"
            }),
        )]
    }

    #[tokio::test]
    async fn test_handle_create_renewal_opportunity_persists_normalized_event() {
        // Arrange
        let repo = Arc::new(RecordingEventRepository::new(Vec::new()));
        let command = CreateRenewalOpportunity {
            base: BaseCommand::new("acme", ""),
            contract_id: "c-1".into(),
            renewal_adjusted_rate: 150,
            ..CreateRenewalOpportunity::default()
        };

        // Act
        let outcome = handle_create_renewal_opportunity(&command, &handler(repo.clone()))
            .await
            .unwrap();

        // Assert
        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        let (stream, expected_version, events) = &appended[0];
        assert_eq!(stream.aggregate_type, "opportunity");
        assert_eq!(stream.aggregate_id, outcome.aggregate_id);
        assert_eq!(*expected_version, 0);
        assert_eq!(events[0].event_type, "V1_OPPORTUNITY_CREATE_RENEWAL");
        assert_eq!(events[0].payload["renewalLikelihood"], "HIGH");
        assert_eq!(events[0].payload["renewalAdjustedRate"], 100);
        assert_eq!(events[0].metadata.correlation_id, command.base.correlation_id);
    }

    #[tokio::test]
    async fn test_handle_create_renewal_opportunity_requires_contract() {
        let repo = Arc::new(RecordingEventRepository::new(Vec::new()));
        let command = CreateRenewalOpportunity {
            base: BaseCommand::new("acme", ""),
            ..CreateRenewalOpportunity::default()
        };

        let result = handle_create_renewal_opportunity(&command, &handler(repo.clone())).await;

        match result {
            Err(DomainError::Validation(msg)) => assert_eq!(msg, "contract id must not be empty"),
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_next_cycle_date_appends_after_history() {
        // Arrange
        let stream = StreamId::new("acme", "opportunity", "opp-1");
        let repo = Arc::new(RecordingEventRepository::new(renewal_history(&stream)));
        let renewed_at = FixedClock::default_instant().0 + chrono::Duration::days(365);
        let command = UpdateRenewalOpportunityNextCycleDate {
            base: BaseCommand::new("acme", "opp-1"),
            renewed_at: Some(renewed_at),
            updated_at: None,
        };

        // Act
        let outcome =
            handle_update_renewal_opportunity_next_cycle_date(&command, &handler(repo.clone()))
                .await
                .unwrap();

        // Assert
        assert_eq!(outcome.events.len(), 1);
        let (_, expected_version, events) = &repo.appended_events()[0];
        assert_eq!(*expected_version, 1);
        assert_eq!(events[0].version, 2);
        assert_eq!(events[0].event_type, "V1_OPPORTUNITY_UPDATE_NEXT_CYCLE_DATE");
    }

    #[tokio::test]
    async fn test_handle_close_win_on_missing_opportunity_returns_not_found() {
        let handler = CommandHandler::new(
            AggregateStore::new(Arc::new(EmptyEventRepository)),
            Arc::new(FixedClock::default_instant()),
        );
        let command = CloseWinOpportunity {
            base: BaseCommand::new("acme", "opp-404"),
            closed_at: None,
        };

        let result = handle_close_win_opportunity(&command, &handler).await;

        match result {
            Err(DomainError::AggregateNotFound(stream)) => {
                assert_eq!(stream.aggregate_id, "opp-404");
            }
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }
}
