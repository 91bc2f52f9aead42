//! Command handlers for the Issue context.

use crm_core::error::DomainError;
use crm_core::handler::{CommandHandler, CommandOutcome};
use tracing::instrument;

use crate::domain::aggregates::Issue;
use crate::domain::commands::{
    AddUserAssignee, AddUserFollower, CreateIssue, RemoveUserAssignee, RemoveUserFollower,
    UpdateIssue,
};

/// Handles the `CreateIssue` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the tenant is missing or the issue
/// already exists, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant))]
pub async fn handle_create_issue(
    command: &CreateIssue,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Issue, _>(command).await
}

/// Handles the `UpdateIssue` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the issue does not exist, or
/// any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, issue_id = %command.base.object_id))]
pub async fn handle_update_issue(
    command: &UpdateIssue,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Issue, _>(command).await
}

/// Handles the `AddUserAssignee` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the issue does not exist,
/// `DomainError::Validation` for a blank user id, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, issue_id = %command.base.object_id))]
pub async fn handle_add_user_assignee(
    command: &AddUserAssignee,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Issue, _>(command).await
}

/// Handles the `RemoveUserAssignee` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the issue does not exist,
/// `DomainError::Validation` for a blank user id, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, issue_id = %command.base.object_id))]
pub async fn handle_remove_user_assignee(
    command: &RemoveUserAssignee,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Issue, _>(command).await
}

/// Handles the `AddUserFollower` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the issue does not exist,
/// `DomainError::Validation` for a blank user id, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, issue_id = %command.base.object_id))]
pub async fn handle_add_user_follower(
    command: &AddUserFollower,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Issue, _>(command).await
}

/// Handles the `RemoveUserFollower` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the issue does not exist,
/// `DomainError::Validation` for a blank user id, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, issue_id = %command.base.object_id))]
pub async fn handle_remove_user_follower(
    command: &RemoveUserFollower,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<Issue, _>(command).await
}
