//! Read-model lookup endpoint.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use crm_core::error::DomainError;
use crm_core::event::StreamId;
use crm_projections::read_store::Document;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /{kind}/{tenant}/{id}
async fn get_record(
    State(state): State<AppState>,
    Path((kind, tenant, id)): Path<(String, String, String)>,
) -> Result<Json<Document>, ApiError> {
    let document = state
        .read_store
        .get(&kind, &tenant, &id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(StreamId::new(&tenant, &kind, &id)))?;
    Ok(Json(document))
}

/// Returns the read-model router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{kind}/{tenant}/{id}", get(get_record))
}
