//! Organization command endpoints.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::put};
use crm_core::command::BaseCommand;
use crm_organization::application::command_handlers::handle_update_organization_owner;
use crm_organization::domain::commands::UpdateOrganizationOwner;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for PUT /{tenant}/{organization_id}/owner.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOwnerRequest {
    /// The new owner.
    pub owner_user_id: String,
    /// User on whose behalf the change is made.
    #[serde(default)]
    pub logged_in_user_id: String,
    /// Application that issued the change.
    #[serde(default)]
    pub app_source: String,
}

/// Response after handling a command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    /// Identifier of the affected aggregate.
    pub aggregate_id: String,
    /// Number of events committed.
    pub events: usize,
    /// Attempts the command took.
    pub attempts: u32,
}

/// PUT /{tenant}/{organization_id}/owner
async fn update_owner(
    State(state): State<AppState>,
    Path((tenant, organization_id)): Path<(String, String)>,
    Json(body): Json<UpdateOwnerRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = UpdateOrganizationOwner {
        base: BaseCommand::new(tenant, organization_id)
            .by_user(body.logged_in_user_id)
            .from_app(body.app_source),
        owner_user_id: body.owner_user_id,
    };
    let outcome = handle_update_organization_owner(&command, &state.handler, &state.outbox).await?;
    Ok(Json(CommandResponse {
        aggregate_id: outcome.aggregate_id,
        events: outcome.events.len(),
        attempts: outcome.attempts,
    }))
}

/// Returns the organizations router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{tenant}/{organization_id}/owner", put(update_owner))
}
