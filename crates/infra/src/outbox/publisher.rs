//! Delivery target for dispatched outbox messages.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::OutboxMessage;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish failed: {0}")]
    Failed(String),
}

impl PublishError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Downstream sink for domain events read from the outbox.
///
/// A failed publish is retried on the next polling round until the message
/// dead-letters, so implementations should be idempotent on the consumer
/// side (delivery is at-least-once).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError>;
}

/// Publisher that only logs. Used until a real broker integration is wired
/// in, and as the default for local development.
#[derive(Debug, Clone, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
        info!(
            message_id = %message.id,
            aggregate_id = %message.aggregate_id,
            aggregate_type = %message.aggregate_type,
            event_type = %message.event_type,
            "event published"
        );
        Ok(())
    }
}
