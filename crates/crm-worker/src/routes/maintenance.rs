//! Maintenance job endpoints.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use serde::Serialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Totals of a maintenance run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    /// Pages read from the read store.
    pub pages: usize,
    /// Renewals rolled into their next cycle.
    pub items: usize,
    /// Whether the run stopped early on shutdown.
    pub cancelled: bool,
}

/// POST /renewal-rollout
///
/// Rolls over every renewal due now. Shutdown cancels the run between pages.
#[instrument(skip_all)]
async fn renewal_rollout(State(state): State<AppState>) -> Result<Json<RunResponse>, ApiError> {
    let outcome = state
        .rollout
        .run(&state.shutdown, state.clock.now())
        .await?;
    Ok(Json(RunResponse {
        pages: outcome.pages,
        items: outcome.items,
        cancelled: outcome.cancelled,
    }))
}

/// Returns the maintenance router.
pub fn router() -> Router<AppState> {
    Router::new().route("/renewal-rollout", post(renewal_rollout))
}
