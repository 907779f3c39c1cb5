//! Aggregate contract and the embeddable bookkeeping it is built from.

use chrono::{DateTime, Utc};

use crate::event::DomainEvent;
use crate::id::AggregateId;

/// The capability a unit of work needs from a domain aggregate.
///
/// An aggregate buffers the events its own state-changing operations produce.
/// The buffer is drained into the outbox by the unit of work at commit time
/// and must be cleared **only after** those events are durably persisted,
/// never speculatively. Rolled-back operations leave the buffer untouched;
/// the aggregate instance is expected to be discarded by the caller.
pub trait Aggregate: Send {
    /// Identity of this aggregate (shared with its persisted rows).
    fn aggregate_id(&self) -> AggregateId;

    /// Append an event produced by a state-changing operation.
    fn record(&mut self, event: DomainEvent);

    /// Events buffered since the last successful persist.
    fn pending_events(&self) -> &[DomainEvent];

    /// Drop the buffer after a successful durable persist.
    fn clear_events(&mut self);
}

/// Identity + timestamps + pending-event buffer, embedded by every aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMeta {
    id: AggregateId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl AggregateMeta {
    /// Fresh aggregate: both timestamps are the same UTC instant.
    pub fn new(id: AggregateId) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        }
    }

    /// Rebuild from persisted state; the event buffer starts empty.
    pub fn reconstitute(
        id: AggregateId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            created_at,
            updated_at,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Mark a mutation: bumps `updated_at` only.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_meta_has_equal_timestamps() {
        let before = Utc::now();
        let meta = AggregateMeta::new(AggregateId::new());
        let after = Utc::now();

        assert_eq!(meta.created_at(), meta.updated_at());
        assert!(meta.created_at() >= before && meta.created_at() <= after);
        assert!(meta.pending_events().is_empty());
    }

    #[test]
    fn reconstitute_preserves_timestamps_and_starts_empty() {
        let created = "2024-01-01T12:00:00Z".parse().unwrap();
        let updated = "2024-06-15T18:30:00Z".parse().unwrap();
        let id = AggregateId::new();

        let meta = AggregateMeta::reconstitute(id, created, updated);

        assert_eq!(meta.id(), id);
        assert_eq!(meta.created_at(), created);
        assert_eq!(meta.updated_at(), updated);
        assert!(meta.pending_events().is_empty());
    }

    #[test]
    fn touch_updates_only_updated_at() {
        let created = "2024-01-01T12:00:00Z".parse().unwrap();
        let updated = "2024-06-15T18:30:00Z".parse().unwrap();
        let later = "2024-12-25T10:00:00Z".parse().unwrap();

        let mut meta = AggregateMeta::reconstitute(AggregateId::new(), created, updated);
        meta.touch(later);

        assert_eq!(meta.created_at(), created);
        assert_eq!(meta.updated_at(), later);
    }

    #[test]
    fn buffer_is_insertion_ordered_and_clearable() {
        let id = AggregateId::new();
        let mut meta = AggregateMeta::new(id);

        meta.record(DomainEvent::new(id, "Workflow", "First", json!({})));
        meta.record(DomainEvent::new(id, "Workflow", "Second", json!({})));

        let types: Vec<_> = meta
            .pending_events()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(types, vec!["First", "Second"]);

        meta.clear_events();
        assert!(meta.pending_events().is_empty());
    }
}
