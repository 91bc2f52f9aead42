//! Event buffer endpoints.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use crm_dispatch::dispatcher::DispatchSummary;
use serde::Serialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Counts of one on-demand drain.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    /// Entries forwarded and removed.
    pub forwarded: usize,
    /// Entries whose forwarding failed.
    pub failed: usize,
    /// Denylisted entries left untouched.
    pub skipped: usize,
}

impl From<DispatchSummary> for DispatchResponse {
    fn from(summary: DispatchSummary) -> Self {
        Self {
            forwarded: summary.forwarded,
            failed: summary.failed,
            skipped: summary.skipped,
        }
    }
}

/// POST /dispatch
#[instrument(skip_all)]
async fn dispatch(State(state): State<AppState>) -> Result<Json<DispatchResponse>, ApiError> {
    let summary = state.dispatcher.dispatch().await?;
    Ok(Json(summary.into()))
}

/// Returns the event buffer router.
pub fn router() -> Router<AppState> {
    Router::new().route("/dispatch", post(dispatch))
}
