//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crm_core::error::DomainError;
use crm_core::event::{EventMetadata, StreamId};
use crm_core::repository::{EventRepository, StoredEvent};

use crate::infrastructure;

/// PostgreSQL-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct EventRow {
    event_id: Uuid,
    tenant: String,
    aggregate_type: String,
    aggregate_id: String,
    version: i64,
    event_type: String,
    schema_version: i32,
    payload: serde_json::Value,
    metadata: Json<EventMetadata>,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            stream: StreamId::new(row.tenant, row.aggregate_type, row.aggregate_id),
            event_type: row.event_type,
            schema_version: row.schema_version,
            version: row.version,
            payload: row.payload,
            metadata: row.metadata.0,
            occurred_at: row.occurred_at,
        }
    }
}

/// Unique constraint guarding one row per stream version.
const STREAM_VERSION_CONSTRAINT: &str = "events_stream_version_key";

fn conflict(stream: &StreamId, expected: i64, actual: i64) -> DomainError {
    DomainError::WrongExpectedVersion {
        stream: stream.clone(),
        expected,
        actual,
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(&self, stream: &StreamId) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, tenant, aggregate_type, aggregate_id, version, event_type,
                   schema_version, payload, metadata, occurred_at
            FROM events
            WHERE tenant = $1 AND aggregate_type = $2 AND aggregate_id = $3
            ORDER BY version ASC
            ",
        )
        .bind(&stream.tenant)
        .bind(&stream.aggregate_type)
        .bind(&stream.aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn append_events(
        &self,
        stream: &StreamId,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        let actual: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(MAX(version), 0)
            FROM events
            WHERE tenant = $1 AND aggregate_type = $2 AND aggregate_id = $3
            ",
        )
        .bind(&stream.tenant)
        .bind(&stream.aggregate_type)
        .bind(&stream.aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(infrastructure)?;

        if actual != expected_version {
            return Err(conflict(stream, expected_version, actual));
        }

        for event in events {
            let inserted = sqlx::query(
                r"
                INSERT INTO events (event_id, tenant, aggregate_type, aggregate_id, version,
                                    event_type, schema_version, payload, metadata, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(event.event_id)
            .bind(&stream.tenant)
            .bind(&stream.aggregate_type)
            .bind(&stream.aggregate_id)
            .bind(event.version)
            .bind(&event.event_type)
            .bind(event.schema_version)
            .bind(&event.payload)
            .bind(Json(&event.metadata))
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await;

            // A concurrent writer passed the same version check and committed
            // first; its rows occupy at least the next version. Any other
            // unique violation (a duplicate event id) is not a conflict.
            if let Err(err) = inserted {
                let version_taken = err.as_database_error().is_some_and(|db| {
                    db.is_unique_violation()
                        && db.constraint() == Some(STREAM_VERSION_CONSTRAINT)
                });
                return Err(if version_taken {
                    conflict(stream, expected_version, expected_version + 1)
                } else {
                    infrastructure(err)
                });
            }
        }

        tx.commit().await.map_err(infrastructure)?;

        debug!(
            %stream,
            expected_version,
            events = events.len(),
            "events appended"
        );
        Ok(())
    }

    async fn list_streams(&self, aggregate_type: &str) -> Result<Vec<StreamId>, DomainError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"
            SELECT DISTINCT tenant, aggregate_id
            FROM events
            WHERE aggregate_type = $1
            ORDER BY tenant, aggregate_id
            ",
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(rows
            .into_iter()
            .map(|(tenant, aggregate_id)| StreamId::new(tenant, aggregate_type, aggregate_id))
            .collect())
    }
}
