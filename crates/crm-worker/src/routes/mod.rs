//! Route modules of the worker's admin API.

use axum::Router;

use crate::state::AppState;

pub mod event_buffer;
pub mod health;
pub mod maintenance;
pub mod organizations;
pub mod read_models;

/// The full router, as served by the binary.
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/event-buffer", event_buffer::router())
        .nest("/api/v1/maintenance", maintenance::router())
        .nest("/api/v1/organizations", organizations::router())
        .nest("/api/v1/read-models", read_models::router())
        .with_state(app_state)
}
