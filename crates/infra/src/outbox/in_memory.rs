//! In-memory outbox store for tests.
//!
//! Emulates an idealized `FOR UPDATE SKIP LOCKED` partition: messages handed
//! out by `find_unprocessed` stay claimed until `mark_processed` or
//! `increment_retry` settles them, so concurrent dispatchers never see the
//! same message twice in flight. The Postgres store is weaker (its row locks
//! end with the SELECT), which at-least-once delivery tolerates.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowgraph_core::{DomainEvent, EventId};

use super::{OutboxMessage, OutboxReader, OutboxStoreError, OutboxWriter};
use async_trait::async_trait;

#[derive(Debug, Default)]
struct State {
    messages: HashMap<EventId, OutboxMessage>,
    claimed: HashSet<EventId>,
}

#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    inner: Mutex<State>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert(&self, message: OutboxMessage) {
        let mut state = self.inner.lock().unwrap();
        state.messages.insert(message.id, message);
    }

    pub fn insert_event(&self, event: &DomainEvent) {
        self.insert(OutboxMessage::from_event(event));
    }

    pub fn get(&self, id: EventId) -> Option<OutboxMessage> {
        self.inner.lock().unwrap().messages.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backdate a processed timestamp, for retention tests.
    pub fn set_processed_at(&self, id: EventId, processed_at: Option<DateTime<Utc>>) {
        let mut state = self.inner.lock().unwrap();
        if let Some(message) = state.messages.get_mut(&id) {
            message.processed_at = processed_at;
        }
    }
}

#[async_trait]
impl OutboxReader for InMemoryOutboxStore {
    async fn find_unprocessed(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut pending: Vec<OutboxMessage> = state
            .messages
            .values()
            .filter(|m| {
                m.processed_at.is_none()
                    && m.retry_count < max_retries
                    && !state.claimed.contains(&m.id)
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit.max(0) as usize);

        for message in &pending {
            state.claimed.insert(message.id);
        }
        Ok(pending)
    }

    async fn find_dead_letters(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> Result<Vec<OutboxMessage>, OutboxStoreError> {
        let state = self.inner.lock().unwrap();
        let mut dead: Vec<OutboxMessage> = state
            .messages
            .values()
            .filter(|m| m.is_dead_letter(max_retries))
            .cloned()
            .collect();
        dead.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        dead.truncate(limit.max(0) as usize);
        Ok(dead)
    }

    async fn count_dead_letters(&self, max_retries: i32) -> Result<u64, OutboxStoreError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .messages
            .values()
            .filter(|m| m.is_dead_letter(max_retries))
            .count() as u64)
    }
}

#[async_trait]
impl OutboxWriter for InMemoryOutboxStore {
    async fn mark_processed(&self, id: EventId) -> Result<(), OutboxStoreError> {
        let mut state = self.inner.lock().unwrap();
        state.claimed.remove(&id);
        match state.messages.get_mut(&id) {
            Some(message) => {
                message.processed_at = Some(Utc::now());
                Ok(())
            }
            None => Err(OutboxStoreError::NotFound(id)),
        }
    }

    async fn increment_retry(&self, id: EventId) -> Result<i32, OutboxStoreError> {
        let mut state = self.inner.lock().unwrap();
        state.claimed.remove(&id);
        match state.messages.get_mut(&id) {
            Some(message) => {
                message.retry_count += 1;
                Ok(message.retry_count)
            }
            None => Err(OutboxStoreError::NotFound(id)),
        }
    }

    async fn delete_processed(&self, older_than: Duration) -> Result<u64, OutboxStoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
        let mut state = self.inner.lock().unwrap();
        let before = state.messages.len();
        state
            .messages
            .retain(|_, m| !matches!(m.processed_at, Some(at) if at < cutoff));
        Ok((before - state.messages.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::AggregateId;
    use serde_json::json;

    fn message(created_at: DateTime<Utc>) -> OutboxMessage {
        OutboxMessage {
            id: EventId::new(),
            aggregate_id: AggregateId::new(),
            aggregate_type: "Workflow".into(),
            event_type: "CreateWorkflow".into(),
            payload: json!({"name": "wf"}),
            created_at,
            processed_at: None,
            retry_count: 0,
        }
    }

    #[tokio::test]
    async fn unprocessed_messages_come_back_oldest_first() {
        let store = InMemoryOutboxStore::new();
        let newer = message(Utc::now());
        let older = message(Utc::now() - chrono::Duration::seconds(30));
        store.insert(newer.clone());
        store.insert(older.clone());

        let batch = store.find_unprocessed(10, 5).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, older.id);
        assert_eq!(batch[1].id, newer.id);
    }

    #[tokio::test]
    async fn claimed_messages_are_skipped_until_settled() {
        let store = InMemoryOutboxStore::new();
        let msg = message(Utc::now());
        store.insert(msg.clone());

        let first = store.find_unprocessed(10, 5).await.unwrap();
        assert_eq!(first.len(), 1);

        // A concurrent dispatcher polling now sees nothing.
        let second = store.find_unprocessed(10, 5).await.unwrap();
        assert!(second.is_empty());

        // A failed delivery releases the claim for the next poll.
        store.increment_retry(msg.id).await.unwrap();
        let third = store.find_unprocessed(10, 5).await.unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].retry_count, 1);
    }

    #[tokio::test]
    async fn messages_at_max_retries_become_dead_letters() {
        let store = InMemoryOutboxStore::new();
        let msg = message(Utc::now());
        store.insert(msg.clone());

        for _ in 0..3 {
            store.increment_retry(msg.id).await.unwrap();
        }

        assert!(store.find_unprocessed(10, 3).await.unwrap().is_empty());
        let dead = store.find_dead_letters(10, 3).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, msg.id);
        assert_eq!(store.count_dead_letters(3).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cleanup_only_removes_messages_past_the_retention_cutoff() {
        let store = InMemoryOutboxStore::new();
        let retention = Duration::from_secs(3600);

        let expired = message(Utc::now());
        let fresh = message(Utc::now());
        let unprocessed = message(Utc::now());
        store.insert(expired.clone());
        store.insert(fresh.clone());
        store.insert(unprocessed.clone());

        store.set_processed_at(
            expired.id,
            Some(Utc::now() - chrono::Duration::seconds(3601)),
        );
        store.set_processed_at(
            fresh.id,
            Some(Utc::now() - chrono::Duration::seconds(3599)),
        );

        let deleted = store.delete_processed(retention).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get(expired.id).is_none());
        assert!(store.get(fresh.id).is_some());
        assert!(store.get(unprocessed.id).is_some());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let store = InMemoryOutboxStore::new();
        let msg = message(Utc::now());
        store.insert(msg.clone());
        store.set_processed_at(msg.id, Some(Utc::now() - chrono::Duration::days(8)));

        let retention = Duration::from_secs(7 * 24 * 3600);
        assert_eq!(store.delete_processed(retention).await.unwrap(), 1);
        assert_eq!(store.delete_processed(retention).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dead_letters_survive_cleanup() {
        let store = InMemoryOutboxStore::new();
        let msg = message(Utc::now() - chrono::Duration::days(30));
        store.insert(msg.clone());
        for _ in 0..5 {
            store.increment_retry(msg.id).await.unwrap();
        }

        assert_eq!(store.delete_processed(Duration::from_secs(0)).await.unwrap(), 0);
        assert_eq!(store.count_dead_letters(5).await.unwrap(), 1);
    }
}
