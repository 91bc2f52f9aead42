//! Command handlers for the User context.

use crm_core::error::DomainError;
use crm_core::handler::{CommandHandler, CommandOutcome};
use tracing::instrument;

use crate::domain::aggregates::User;
use crate::domain::commands::{AddRole, CreateUser, RemoveRole, UpdateUser};

/// Handles the `CreateUser` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the tenant is missing or the user
/// already exists, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant))]
pub async fn handle_create_user(
    command: &CreateUser,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<User, _>(command).await
}

/// Handles the `UpdateUser` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist, or
/// any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, user_id = %command.base.object_id))]
pub async fn handle_update_user(
    command: &UpdateUser,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<User, _>(command).await
}

/// Handles the `AddRole` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist,
/// `DomainError::Validation` for a blank role, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, user_id = %command.base.object_id, role = %command.role))]
pub async fn handle_add_role(
    command: &AddRole,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<User, _>(command).await
}

/// Handles the `RemoveRole` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist,
/// `DomainError::Validation` for a blank role, or any store error.
#[instrument(skip_all, fields(tenant = %command.base.tenant, user_id = %command.base.object_id, role = %command.role))]
pub async fn handle_remove_role(
    command: &RemoveRole,
    handler: &CommandHandler,
) -> Result<CommandOutcome, DomainError> {
    handler.handle::<User, _>(command).await
}
