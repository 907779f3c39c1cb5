//! Background outbox processor.
//!
//! Runs two loops: a dispatch loop that polls for unprocessed messages and
//! hands them to the [`EventPublisher`], and a cleanup loop that deletes
//! messages processed longer ago than the retention period. A message whose
//! delivery fails keeps its place in the table with an incremented retry
//! count; once the count reaches `max_retries` it is dead-lettered and left
//! for inspection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{EventPublisher, OutboxReader, OutboxStoreError, OutboxWriter};

/// Tuning knobs for the processor loops.
#[derive(Debug, Clone)]
pub struct OutboxProcessorConfig {
    /// Maximum messages fetched per polling round.
    pub batch_size: i64,
    /// How often the dispatch loop polls for work.
    pub poll_interval: Duration,
    /// How often the cleanup loop runs.
    pub cleanup_interval: Duration,
    /// How long processed messages are kept before cleanup removes them.
    pub retention_period: Duration,
    /// Delivery attempts before a message dead-letters.
    pub max_retries: i32,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(3600),
            retention_period: Duration::from_secs(7 * 24 * 3600),
            max_retries: 5,
        }
    }
}

impl OutboxProcessorConfig {
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    pub fn with_retention_period(mut self, retention_period: Duration) -> Self {
        self.retention_period = retention_period;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Handle to a running processor. Dropping it also stops the loops.
pub struct OutboxProcessorHandle {
    shutdown: watch::Sender<bool>,
    dispatch: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl OutboxProcessorHandle {
    /// Request shutdown and wait for both loops to finish. In-flight batch
    /// work completes before the loops exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.dispatch.await;
        let _ = self.cleanup.await;
        info!("outbox processor stopped");
    }
}

/// Polls the outbox and delivers messages to the publisher.
pub struct OutboxProcessor {
    reader: Arc<dyn OutboxReader>,
    writer: Arc<dyn OutboxWriter>,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxProcessorConfig,
}

impl OutboxProcessor {
    pub fn new(
        reader: Arc<dyn OutboxReader>,
        writer: Arc<dyn OutboxWriter>,
        publisher: Arc<dyn EventPublisher>,
        config: OutboxProcessorConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            publisher,
            config,
        }
    }

    /// Spawn the dispatch and cleanup loops.
    pub fn start(self) -> OutboxProcessorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatch = tokio::spawn(dispatch_loop(
            self.reader.clone(),
            self.writer.clone(),
            self.publisher.clone(),
            self.config.clone(),
            shutdown_rx.clone(),
        ));
        let cleanup = tokio::spawn(cleanup_loop(self.writer, self.config, shutdown_rx));

        info!("outbox processor started");
        OutboxProcessorHandle {
            shutdown: shutdown_tx,
            dispatch,
            cleanup,
        }
    }
}

async fn dispatch_loop(
    reader: Arc<dyn OutboxReader>,
    writer: Arc<dyn OutboxWriter>,
    publisher: Arc<dyn EventPublisher>,
    config: OutboxProcessorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = Instant::now() + config.poll_interval;
    let mut ticker = interval_at(start, config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                match process_batch(
                    reader.as_ref(),
                    writer.as_ref(),
                    publisher.as_ref(),
                    &config,
                )
                .await
                {
                    Ok(0) => {}
                    Ok(dispatched) => debug!(dispatched, "outbox batch dispatched"),
                    Err(err) => warn!(error = %err, "failed to fetch outbox batch"),
                }
            }
        }
    }
}

async fn cleanup_loop(
    writer: Arc<dyn OutboxWriter>,
    config: OutboxProcessorConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let start = Instant::now() + config.cleanup_interval;
    let mut ticker = interval_at(start, config.cleanup_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                match writer.delete_processed(config.retention_period).await {
                    Ok(0) => {}
                    Ok(deleted) => info!(deleted, "cleaned up processed outbox messages"),
                    Err(err) => warn!(error = %err, "outbox cleanup failed"),
                }
            }
        }
    }
}

/// Fetch one batch and deliver each message. Per-message failures increment
/// the retry counter and the loop moves on; only the initial fetch error is
/// returned. Returns the number of successfully delivered messages.
pub(crate) async fn process_batch(
    reader: &dyn OutboxReader,
    writer: &dyn OutboxWriter,
    publisher: &dyn EventPublisher,
    config: &OutboxProcessorConfig,
) -> Result<usize, OutboxStoreError> {
    let messages = reader
        .find_unprocessed(config.batch_size, config.max_retries)
        .await?;

    let mut dispatched = 0;
    for message in &messages {
        match publisher.publish(message).await {
            Ok(()) => {
                if let Err(err) = writer.mark_processed(message.id).await {
                    warn!(message_id = %message.id, error = %err, "failed to mark outbox message processed");
                } else {
                    dispatched += 1;
                }
            }
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    event_type = %message.event_type,
                    error = %err,
                    "failed to publish outbox message"
                );
                match writer.increment_retry(message.id).await {
                    Ok(retries) if retries >= config.max_retries => {
                        warn!(
                            message_id = %message.id,
                            event_type = %message.event_type,
                            retries,
                            "outbox message dead-lettered"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(message_id = %message.id, error = %err, "failed to increment outbox retry count");
                    }
                }
            }
        }
    }

    Ok(dispatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::publisher::PublishError;
    use crate::outbox::{InMemoryOutboxStore, NoopEventPublisher, OutboxMessage};
    use async_trait::async_trait;
    use chrono::Utc;
    use flowgraph_core::{AggregateId, EventId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn message() -> OutboxMessage {
        OutboxMessage {
            id: EventId::new(),
            aggregate_id: AggregateId::new(),
            aggregate_type: "Workflow".into(),
            event_type: "CreateWorkflow".into(),
            payload: json!({"name": "wf"}),
            created_at: Utc::now(),
            processed_at: None,
            retry_count: 0,
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _message: &OutboxMessage) -> Result<(), PublishError> {
            Err(PublishError::failed("broker unavailable"))
        }
    }

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyPublisher {
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl EventPublisher for FlakyPublisher {
        async fn publish(&self, _message: &OutboxMessage) -> Result<(), PublishError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(PublishError::failed("transient failure"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<EventId>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, message: &OutboxMessage) -> Result<(), PublishError> {
            self.published.lock().unwrap().push(message.id);
            Ok(())
        }
    }

    fn test_config() -> OutboxProcessorConfig {
        OutboxProcessorConfig::default()
            .with_batch_size(10)
            .with_max_retries(3)
    }

    #[tokio::test]
    async fn successful_dispatch_marks_messages_processed() {
        let store = InMemoryOutboxStore::arc();
        let publisher = RecordingPublisher::default();
        let config = test_config();

        let msg = message();
        store.insert(msg.clone());

        let dispatched = process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
            .await
            .unwrap();
        assert_eq!(dispatched, 1);
        assert!(store.get(msg.id).unwrap().processed_at.is_some());
        assert_eq!(*publisher.published.lock().unwrap(), vec![msg.id]);
    }

    #[tokio::test]
    async fn failed_delivery_retries_until_dead_letter() {
        let store = InMemoryOutboxStore::arc();
        let publisher = FailingPublisher;
        let config = test_config();

        let msg = message();
        store.insert(msg.clone());

        for round in 1..=3 {
            let dispatched = process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
                .await
                .unwrap();
            assert_eq!(dispatched, 0);
            assert_eq!(store.get(msg.id).unwrap().retry_count, round);
        }

        // Exhausted: the dispatcher no longer picks it up, but it is still
        // observable as a dead letter.
        let dispatched = process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
            .await
            .unwrap();
        assert_eq!(dispatched, 0);
        assert_eq!(store.get(msg.id).unwrap().retry_count, 3);
        assert_eq!(store.count_dead_letters(config.max_retries).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_a_later_round() {
        let store = InMemoryOutboxStore::arc();
        let publisher = FlakyPublisher {
            failures: 2,
            attempts: AtomicUsize::new(0),
        };
        let config = test_config();

        let msg = message();
        store.insert(msg.clone());

        for _ in 0..2 {
            process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
                .await
                .unwrap();
        }
        assert_eq!(store.get(msg.id).unwrap().retry_count, 2);

        let dispatched = process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
            .await
            .unwrap();
        assert_eq!(dispatched, 1);
        let settled = store.get(msg.id).unwrap();
        assert!(settled.processed_at.is_some());
        assert_eq!(settled.retry_count, 2);
    }

    #[tokio::test]
    async fn one_bad_message_does_not_block_the_rest_of_the_batch() {
        let store = InMemoryOutboxStore::arc();
        let config = test_config();

        // Fails only the first publish of the round.
        let publisher = FlakyPublisher {
            failures: 1,
            attempts: AtomicUsize::new(0),
        };

        let first = message();
        let second = OutboxMessage {
            created_at: first.created_at + chrono::Duration::seconds(1),
            ..message()
        };
        store.insert(first.clone());
        store.insert(second.clone());

        let dispatched = process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
            .await
            .unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(store.get(first.id).unwrap().retry_count, 1);
        assert!(store.get(second.id).unwrap().processed_at.is_some());
    }

    #[tokio::test]
    async fn concurrent_dispatchers_never_process_a_message_twice() {
        let store = InMemoryOutboxStore::arc();
        let publisher = RecordingPublisher::default();
        let config = test_config();

        let seeded: Vec<_> = (0..4).map(|_| message()).collect();
        for msg in &seeded {
            store.insert(msg.clone());
        }

        let (a, b) = tokio::join!(
            process_batch(store.as_ref(), store.as_ref(), &publisher, &config),
            process_batch(store.as_ref(), store.as_ref(), &publisher, &config),
        );
        assert_eq!(a.unwrap() + b.unwrap(), seeded.len());

        let mut published = publisher.published.lock().unwrap().clone();
        let attempts = published.len();
        published.sort();
        published.dedup();
        assert_eq!(published.len(), attempts);

        for msg in &seeded {
            assert!(store.get(msg.id).unwrap().processed_at.is_some());
        }
    }

    #[tokio::test]
    async fn full_lifecycle_dispatch_then_cleanup() {
        let store = InMemoryOutboxStore::arc();
        let publisher = NoopEventPublisher;
        let config = test_config();

        let a = message();
        let b = message();
        store.insert(a.clone());
        store.insert(b.clone());

        let dispatched = process_batch(store.as_ref(), store.as_ref(), &publisher, &config)
            .await
            .unwrap();
        assert_eq!(dispatched, 2);
        assert_eq!(store.len(), 2);

        // Retention of zero removes everything already processed.
        store.set_processed_at(a.id, Some(Utc::now() - chrono::Duration::seconds(1)));
        store.set_processed_at(b.id, Some(Utc::now() - chrono::Duration::seconds(1)));
        let deleted = store.delete_processed(Duration::from_secs(0)).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn processor_polls_on_its_interval_and_stops_on_shutdown() {
        let store = InMemoryOutboxStore::arc();
        let config = OutboxProcessorConfig::default()
            .with_poll_interval(Duration::from_millis(50))
            .with_cleanup_interval(Duration::from_secs(3600))
            .with_max_retries(3);

        let msg = message();
        store.insert(msg.clone());

        let processor = OutboxProcessor::new(
            store.clone(),
            store.clone(),
            Arc::new(NoopEventPublisher),
            config,
        );
        let handle = processor.start();

        // No immediate tick: nothing is dispatched before the first interval.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.get(msg.id).unwrap().processed_at.is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get(msg.id).unwrap().processed_at.is_some());

        handle.shutdown().await;

        // No further polling after shutdown.
        let late = message();
        store.insert(late.clone());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.get(late.id).unwrap().processed_at.is_none());
    }
}
