//! Transactional outbox storage and background processing.
//!
//! Events are written to the `outbox` table inside the unit-of-work
//! transaction and delivered later by the [`processor::OutboxProcessor`].
//! Delivery is at-least-once: a message is re-dispatched until it is marked
//! processed or its retry count reaches the configured maximum, at which
//! point it becomes a dead letter. Dead letters stay in the table and are
//! exposed through [`OutboxReader::find_dead_letters`] for inspection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use flowgraph_core::{AggregateId, DomainEvent, EventId};

pub mod in_memory;
pub mod postgres;
pub mod processor;
pub mod publisher;

pub use in_memory::InMemoryOutboxStore;
pub use postgres::PostgresOutboxStore;
pub use processor::{OutboxProcessor, OutboxProcessorConfig, OutboxProcessorHandle};
pub use publisher::{EventPublisher, NoopEventPublisher, PublishError};

/// One row of the `outbox` table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: EventId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
}

impl OutboxMessage {
    /// Build the row a unit-of-work commit would write for `event`.
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            id: event.event_id(),
            aggregate_id: event.aggregate_id(),
            aggregate_type: event.aggregate_type().to_string(),
            event_type: event.event_type().to_string(),
            payload: event.payload().clone(),
            created_at: event.occurred_at(),
            processed_at: None,
            retry_count: 0,
        }
    }

    /// Whether the message has exhausted its delivery attempts.
    pub fn is_dead_letter(&self, max_retries: i32) -> bool {
        self.processed_at.is_none() && self.retry_count >= max_retries
    }
}

#[derive(Debug, Error)]
pub enum OutboxStoreError {
    #[error("outbox {operation} failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("outbox message {0} not found")]
    NotFound(EventId),
}

impl OutboxStoreError {
    pub(crate) fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }
}

/// Read access to pending and dead-lettered outbox messages.
#[async_trait]
pub trait OutboxReader: Send + Sync {
    /// Fetch up to `limit` undelivered messages that still have retries
    /// left, oldest first. Messages claimed by a concurrent dispatcher are
    /// skipped rather than waited on.
    async fn find_unprocessed(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError>;

    /// Fetch up to `limit` messages that exhausted their retries, oldest
    /// first.
    async fn find_dead_letters(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError>;

    async fn count_dead_letters(&self, max_retries: i32) -> Result<u64, OutboxStoreError>;
}

/// Bookkeeping operations performed by the dispatcher and the cleanup loop.
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    async fn mark_processed(&self, id: EventId) -> Result<(), OutboxStoreError>;

    /// Increment the retry counter and return the new value.
    async fn increment_retry(&self, id: EventId) -> Result<i32, OutboxStoreError>;

    /// Delete messages processed more than `older_than` ago. Returns the
    /// number of rows removed. Unprocessed messages, dead letters included,
    /// are never deleted.
    async fn delete_processed(&self, older_than: Duration) -> Result<u64, OutboxStoreError>;
}
