//! CRM Event Store — persistence for the event log and the event buffer.
//!
//! `PostgreSQL` implementations back production; the in-memory ones share the
//! same optimistic-concurrency contract and back tests and local runs. The
//! schema lives in the workspace `migrations/` directory.

pub mod memory;
pub mod pg_event_buffer_repository;
pub mod pg_event_repository;

use crm_core::error::DomainError;

/// Maps a database error to the domain's infrastructure error.
pub(crate) fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {err}"))
}
