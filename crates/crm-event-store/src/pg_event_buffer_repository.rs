//! `PostgreSQL` implementation of the `EventBufferRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crm_core::buffer::{EventBufferEntry, EventBufferRepository};
use crm_core::error::DomainError;

use crate::infrastructure;

/// PostgreSQL-backed event buffer.
#[derive(Debug, Clone)]
pub struct PgEventBufferRepository {
    pool: PgPool,
}

impl PgEventBufferRepository {
    /// Creates a new `PgEventBufferRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct BufferRow {
    id: Uuid,
    event_type: String,
    event_data: Vec<u8>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<BufferRow> for EventBufferEntry {
    fn from(row: BufferRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            event_data: row.event_data,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl EventBufferRepository for PgEventBufferRepository {
    async fn insert(&self, entry: &EventBufferEntry) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO event_buffer (id, event_type, event_data, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(entry.id)
        .bind(&entry.event_type)
        .bind(&entry.event_data)
        .bind(entry.expires_at)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn get_expired(&self, now: DateTime<Utc>) -> Result<Vec<EventBufferEntry>, DomainError> {
        let rows: Vec<BufferRow> = sqlx::query_as(
            r"
            SELECT id, event_type, event_data, expires_at, created_at
            FROM event_buffer
            WHERE expires_at <= $1
            ORDER BY expires_at ASC, created_at ASC
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        Ok(rows.into_iter().map(EventBufferEntry::from).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM event_buffer WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }
}
