//! Domain event envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{AggregateId, EventId};

/// Current event schema version. There is no migration path yet; bump this
/// only together with an upgrade story for already-persisted payloads.
pub const EVENT_SCHEMA_VERSION: i32 = 1;

/// A domain event, immutable once constructed.
///
/// Carries identity, causation (which aggregate produced it), a type tag and
/// a UTC timestamp. The payload is an opaque JSON document from the point of
/// view of everything downstream of the aggregate: the outbox persists and
/// ships it without interpreting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    event_id: EventId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    event_type: String,
    occurred_at: DateTime<Utc>,
    version: i32,
    payload: Value,
}

impl DomainEvent {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            version: EVENT_SCHEMA_VERSION,
            payload,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stamps_identity_version_and_utc_timestamp() {
        let aggregate_id = AggregateId::new();
        let before = Utc::now();
        let event = DomainEvent::new(aggregate_id, "Workflow", "CreateWorkflow", json!({"x": 1}));
        let after = Utc::now();

        assert_eq!(event.aggregate_id(), aggregate_id);
        assert_eq!(event.aggregate_type(), "Workflow");
        assert_eq!(event.event_type(), "CreateWorkflow");
        assert_eq!(event.version(), EVENT_SCHEMA_VERSION);
        assert!(event.occurred_at() >= before && event.occurred_at() <= after);
        assert_eq!(event.payload()["x"], 1);
    }

    #[test]
    fn distinct_events_get_distinct_ids() {
        let aggregate_id = AggregateId::new();
        let a = DomainEvent::new(aggregate_id, "Workflow", "AddEdge", json!({}));
        let b = DomainEvent::new(aggregate_id, "Workflow", "AddEdge", json!({}));
        assert_ne!(a.event_id(), b.event_id());
    }
}
