//! Postgres-backed outbox store.
//!
//! `find_unprocessed` uses `FOR UPDATE SKIP LOCKED` so multiple dispatcher
//! instances can poll the same table without handing out the same message
//! twice within a polling round.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Row};
use std::time::Duration;
use tracing::instrument;

use flowgraph_core::{AggregateId, EventId};

use super::{OutboxMessage, OutboxReader, OutboxStoreError, OutboxWriter};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxReader for PostgresOutboxStore {
    #[instrument(skip(self), err)]
    async fn find_unprocessed(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_type, payload,
                   created_at, processed_at, retry_count
            FROM outbox
            WHERE processed_at IS NULL AND retry_count < $1
            ORDER BY created_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(max_retries)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OutboxStoreError::database("find_unprocessed", e))?;

        collect_messages(rows)
    }

    #[instrument(skip(self), err)]
    async fn find_dead_letters(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_type, payload,
                   created_at, processed_at, retry_count
            FROM outbox
            WHERE processed_at IS NULL AND retry_count >= $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(max_retries)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OutboxStoreError::database("find_dead_letters", e))?;

        collect_messages(rows)
    }

    #[instrument(skip(self), err)]
    async fn count_dead_letters(&self, max_retries: i32) -> Result<u64, OutboxStoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM outbox WHERE processed_at IS NULL AND retry_count >= $1",
        )
        .bind(max_retries)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OutboxStoreError::database("count_dead_letters", e))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| OutboxStoreError::database("count_dead_letters", e))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl OutboxWriter for PostgresOutboxStore {
    #[instrument(skip(self), err)]
    async fn mark_processed(&self, id: EventId) -> Result<(), OutboxStoreError> {
        let result = sqlx::query("UPDATE outbox SET processed_at = NOW() WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| OutboxStoreError::database("mark_processed", e))?;

        if result.rows_affected() == 0 {
            return Err(OutboxStoreError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn increment_retry(&self, id: EventId) -> Result<i32, OutboxStoreError> {
        let row = sqlx::query(
            "UPDATE outbox SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OutboxStoreError::database("increment_retry", e))?;

        let row = row.ok_or(OutboxStoreError::NotFound(id))?;
        row.try_get("retry_count")
            .map_err(|e| OutboxStoreError::database("increment_retry", e))
    }

    #[instrument(skip(self), err)]
    async fn delete_processed(&self, older_than: Duration) -> Result<u64, OutboxStoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
        let result = sqlx::query(
            "DELETE FROM outbox WHERE processed_at IS NOT NULL AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| OutboxStoreError::database("delete_processed", e))?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug)]
struct OutboxRow {
    id: uuid::Uuid,
    aggregate_id: uuid::Uuid,
    aggregate_type: String,
    event_type: String,
    payload: Value,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    retry_count: i32,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for OutboxRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(OutboxRow {
            id: row.try_get("id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            processed_at: row.try_get("processed_at")?,
            retry_count: row.try_get("retry_count")?,
        })
    }
}

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        OutboxMessage {
            id: EventId::from_uuid(row.id),
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            event_type: row.event_type,
            payload: row.payload,
            created_at: row.created_at,
            processed_at: row.processed_at,
            retry_count: row.retry_count,
        }
    }
}

fn collect_messages(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let parsed = OutboxRow::from_row(&row)
            .map_err(|e| OutboxStoreError::database("decode_row", e))?;
        messages.push(parsed.into());
    }
    Ok(messages)
}
