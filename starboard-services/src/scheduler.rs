//! Drain scheduler
//!
//! Owns the [`DelayQueue`]. Entries arrive from any number of
//! [`EnqueueHandle`]s over a channel; on every tick the scheduler publishes the
//! entries whose delay has elapsed, one at a time, and removes each of them
//! whatever the outcome. Receiving and draining run in the same task, so an
//! enqueue never lands in the middle of a drain pass.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use starboard_core::config::parse_env_or;
use starboard_core::{
    DelayQueue, EventKey, Extractor, QualifyingEvent, QueueEntry, StarboardError, StarboardResult,
};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::publisher::{PublishOutcome, PublisherAdapter};

/// How many drained keys are remembered for deduplication
const DRAINED_KEY_MEMORY: usize = 1024;

/// Timing of the drain loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainConfig {
    /// Settle time between enqueue and publish
    pub post_delay: chrono::Duration,
    /// Wall-clock interval between drain passes
    pub tick_interval: Duration,
}

impl DrainConfig {
    /// Load timing from environment variables
    ///
    /// Expects:
    /// - STARBOARD_POST_DELAY_MINUTES: default 5
    /// - STARBOARD_DRAIN_INTERVAL_SECS: default 30, must be positive
    pub fn from_env() -> StarboardResult<Self> {
        let delay_minutes: u32 = parse_env_or("STARBOARD_POST_DELAY_MINUTES", 5)?;
        let interval_secs: u64 = parse_env_or("STARBOARD_DRAIN_INTERVAL_SECS", 30)?;
        if interval_secs == 0 {
            return Err(StarboardError::configuration(
                "STARBOARD_DRAIN_INTERVAL_SECS",
                "must be at least 1",
            ));
        }

        Ok(Self {
            post_delay: chrono::Duration::minutes(i64::from(delay_minutes)),
            tick_interval: Duration::from_secs(interval_secs),
        })
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            post_delay: chrono::Duration::minutes(5),
            tick_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Between ticks
    Idle,
    /// Publishing due entries
    Draining,
}

/// Result of handing an entry to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Queued,
    /// An entry with the same key was overwritten
    Replaced,
    /// The key was drained before; the entry was discarded
    AlreadyDrained,
}

/// Tally of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub published: usize,
    pub truncated: usize,
    pub dropped: usize,
}

impl DrainReport {
    pub fn processed(&self) -> usize {
        self.published + self.truncated + self.dropped
    }

    fn record(&mut self, outcome: &PublishOutcome) {
        match outcome {
            PublishOutcome::Published { .. } => self.published += 1,
            PublishOutcome::Truncated { .. } => self.truncated += 1,
            PublishOutcome::Dropped { .. } => self.dropped += 1,
        }
    }
}

/// Bounded memory of keys that have already been drained
#[derive(Debug)]
struct DrainedKeys {
    order: VecDeque<EventKey>,
    keys: HashSet<EventKey>,
    capacity: usize,
}

impl DrainedKeys {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, key: &EventKey) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: EventKey) {
        if !self.keys.insert(key) {
            return;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }
}

/// Periodic drain of the delay queue
pub struct DrainScheduler {
    queue: DelayQueue,
    publisher: PublisherAdapter,
    config: DrainConfig,
    drained: DrainedKeys,
    state: SchedulerState,
}

impl DrainScheduler {
    pub fn new(publisher: PublisherAdapter, config: DrainConfig) -> Self {
        Self {
            queue: DelayQueue::new(),
            publisher,
            config,
            drained: DrainedKeys::new(DRAINED_KEY_MEMORY),
            state: SchedulerState::Idle,
        }
    }

    pub fn queue(&self) -> &DelayQueue {
        &self.queue
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Put an entry on the queue
    pub fn accept(&mut self, entry: QueueEntry) -> AcceptOutcome {
        let key = entry.key;
        if self.drained.contains(&key) {
            debug!(%key, "Ignoring event for a post that was already drained");
            return AcceptOutcome::AlreadyDrained;
        }

        match self.queue.insert_entry(entry) {
            Some(_) => {
                warn!(%key, "Queue key collision, replacing the pending post");
                AcceptOutcome::Replaced
            }
            None => {
                debug!(%key, pending = self.queue.len(), "Post queued");
                AcceptOutcome::Queued
            }
        }
    }

    /// Publish and remove every entry due at `now`
    ///
    /// Due keys are snapshotted first, then published sequentially. Each is
    /// removed after its publish attempt regardless of the outcome.
    pub async fn drain_due(&mut self, now: DateTime<Utc>) -> DrainReport {
        self.state = SchedulerState::Draining;
        let mut report = DrainReport::default();

        let due: Vec<EventKey> = self
            .queue
            .due_items(now, self.config.post_delay)
            .map(|entry| entry.key)
            .collect();

        for key in due {
            let Some(entry) = self.queue.get(&key).cloned() else {
                continue;
            };

            info!(%key, stars = entry.payload.star_count, channel = %entry.payload.channel, "Status ready");
            let outcome = self
                .publisher
                .publish(&entry.payload.text, entry.payload.image_url.as_ref())
                .await;
            report.record(&outcome);

            self.queue.remove(&key);
            self.drained.insert(key);
        }

        if report.processed() > 0 {
            info!(
                published = report.published,
                truncated = report.truncated,
                dropped = report.dropped,
                pending = self.queue.len(),
                "Drain pass finished"
            );
        }

        self.state = SchedulerState::Idle;
        report
    }

    /// Run until the event source is gone and the queue is empty
    ///
    /// Ticking starts only once `ready` turns true.
    pub async fn run(
        mut self,
        mut entries: mpsc::UnboundedReceiver<QueueEntry>,
        mut ready: watch::Receiver<bool>,
    ) {
        info!("Drain scheduler waiting for the event source");
        if ready.wait_for(|is_ready| *is_ready).await.is_err() {
            warn!("Event source went away before it was ready, drain scheduler stopping");
            return;
        }

        info!(
            interval_secs = self.config.tick_interval.as_secs(),
            delay_minutes = self.config.post_delay.num_minutes(),
            "Drain scheduler running"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut source_open = true;

        loop {
            tokio::select! {
                entry = entries.recv(), if source_open => match entry {
                    Some(entry) => {
                        self.accept(entry);
                    }
                    None => {
                        info!(pending = self.queue.len(), "Event source closed");
                        source_open = false;
                    }
                },
                _ = interval.tick() => {
                    self.drain_due(Utc::now()).await;
                    if !source_open && self.queue.is_empty() {
                        info!("Queue drained, drain scheduler stopping");
                        return;
                    }
                }
            }
        }
    }
}

/// Errors from [`EnqueueHandle::enqueue`]
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Extract(#[from] StarboardError),

    #[error("Drain scheduler is no longer running")]
    SchedulerStopped,
}

/// The `enqueue(event)` entry point handed to the event source
///
/// Extraction happens here, at enqueue time. Malformed events are logged and
/// never reach the queue.
#[derive(Clone)]
pub struct EnqueueHandle {
    extractor: Arc<Extractor>,
    tx: mpsc::UnboundedSender<QueueEntry>,
}

impl EnqueueHandle {
    /// Create a handle and the receiver to pass to [`DrainScheduler::run`]
    pub fn channel(extractor: Extractor) -> (Self, mpsc::UnboundedReceiver<QueueEntry>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                extractor: Arc::new(extractor),
                tx,
            },
            rx,
        )
    }

    pub fn enqueue(&self, event: &QualifyingEvent) -> Result<EventKey, EnqueueError> {
        self.enqueue_at(event, Utc::now())
    }

    /// Enqueue with an explicit enqueue time
    pub fn enqueue_at(
        &self,
        event: &QualifyingEvent,
        enqueued_at: DateTime<Utc>,
    ) -> Result<EventKey, EnqueueError> {
        let key = event.key();
        let payload = match self.extractor.extract(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%key, error = %e, "Dropping malformed event");
                return Err(e.into());
            }
        };

        info!(%key, stars = payload.star_count, channel = %payload.channel, "Starboard message queued");
        self.tx
            .send(QueueEntry::new(key, payload, enqueued_at))
            .map_err(|_| EnqueueError::SchedulerStopped)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::TruncationPolicy;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use starboard_core::{OriginalAuthor, PostPayload, PostedStatus, PublishError, StatusPublisher};
    use std::sync::Mutex;
    use url::Url;

    #[derive(Default)]
    struct RecordingPublisher {
        texts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl StatusPublisher for RecordingPublisher {
        async fn publish(
            &self,
            text: &str,
            _image_url: Option<&Url>,
        ) -> Result<PostedStatus, PublishError> {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(PublishError::network("connection reset"))
            } else {
                Ok(PostedStatus { id: "1".to_string() })
            }
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn entry(key: DateTime<Utc>, text: &str, enqueued_at: DateTime<Utc>) -> QueueEntry {
        QueueEntry::new(
            key,
            PostPayload {
                text: text.to_string(),
                image_url: None,
                star_count: 10,
                channel: "general".to_string(),
                author: OriginalAuthor::new(None, "alice"),
            },
            enqueued_at,
        )
    }

    fn scheduler(publisher: Arc<RecordingPublisher>) -> DrainScheduler {
        DrainScheduler::new(
            PublisherAdapter::new(publisher, TruncationPolicy::default()),
            DrainConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_drain_waits_for_delay() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut scheduler = scheduler(publisher.clone());
        scheduler.accept(entry(t0(), "hello", t0()));

        let early = scheduler.drain_due(t0() + chrono::Duration::minutes(4)).await;
        assert_eq!(early.processed(), 0);
        assert_eq!(scheduler.queue().len(), 1);

        let late = scheduler.drain_due(t0() + chrono::Duration::minutes(6)).await;
        assert_eq!(late.published, 1);
        assert!(scheduler.queue().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(*publisher.texts.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_publish_still_removes_entry() {
        let publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let mut scheduler = scheduler(publisher.clone());
        scheduler.accept(entry(t0(), "a", t0()));
        scheduler.accept(entry(t0() + chrono::Duration::seconds(1), "b", t0()));

        let report = scheduler.drain_due(t0() + chrono::Duration::minutes(10)).await;
        assert_eq!(report.dropped, 2);
        assert!(scheduler.queue().is_empty());
        // One failing item does not stop the next
        assert_eq!(publisher.texts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_drained_key_is_not_requeued() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut scheduler = scheduler(publisher.clone());
        scheduler.accept(entry(t0(), "first", t0()));
        scheduler.drain_due(t0() + chrono::Duration::minutes(5)).await;

        let later = t0() + chrono::Duration::minutes(7);
        assert_eq!(scheduler.accept(entry(t0(), "again", later)), AcceptOutcome::AlreadyDrained);
        assert!(scheduler.queue().is_empty());

        let report = scheduler.drain_due(later + chrono::Duration::minutes(10)).await;
        assert_eq!(report.processed(), 0);
        assert_eq!(publisher.texts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collision_replaces_pending_entry() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut scheduler = scheduler(publisher.clone());

        assert_eq!(scheduler.accept(entry(t0(), "old", t0())), AcceptOutcome::Queued);
        assert_eq!(
            scheduler.accept(entry(t0(), "new", t0() + chrono::Duration::minutes(1))),
            AcceptOutcome::Replaced
        );

        // The replacement restarts the delay
        let report = scheduler.drain_due(t0() + chrono::Duration::minutes(5)).await;
        assert_eq!(report.processed(), 0);
        scheduler.drain_due(t0() + chrono::Duration::minutes(6)).await;
        assert_eq!(*publisher.texts.lock().unwrap(), vec!["new".to_string()]);
    }

    #[test]
    fn test_drained_keys_are_bounded() {
        let mut drained = DrainedKeys::new(2);
        let keys: Vec<_> = (0..3).map(|i| t0() + chrono::Duration::seconds(i)).collect();
        for key in &keys {
            drained.insert(*key);
        }
        assert!(!drained.contains(&keys[0]));
        assert!(drained.contains(&keys[1]));
        assert!(drained.contains(&keys[2]));
    }

    #[tokio::test]
    async fn test_run_waits_for_ready_and_stops_when_source_closes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let scheduler = DrainScheduler::new(
            PublisherAdapter::new(publisher.clone(), TruncationPolicy::default()),
            DrainConfig {
                post_delay: chrono::Duration::zero(),
                tick_interval: Duration::from_millis(10),
            },
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(rx, ready_rx));

        tx.send(entry(t0(), "queued before ready", t0())).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(publisher.texts.lock().unwrap().is_empty());

        ready_tx.send_replace(true);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert_eq!(
            *publisher.texts.lock().unwrap(),
            vec!["queued before ready".to_string()]
        );
    }

    fn reaction(text: &str, author: Option<&str>) -> QualifyingEvent {
        QualifyingEvent::ReactionThreshold(starboard_core::ReactionEvent {
            message_timestamp: t0(),
            channel_name: "general".to_string(),
            author: author.map(|name| OriginalAuthor::new(Some(7), name)),
            content: starboard_core::MessageContent {
                text: text.to_string(),
                ..Default::default()
            },
            reactions: vec![starboard_core::ReactionTally {
                emoji: starboard_core::ReactionEmoji::Unicode("\u{2B50}".to_string()),
                count: 12,
            }],
        })
    }

    #[test]
    fn test_enqueue_extracts_and_sends() {
        let (handle, mut rx) = EnqueueHandle::channel(Extractor::new(Default::default()).unwrap());

        let key = handle.enqueue_at(&reaction("great post", Some("alice")), t0()).unwrap();
        assert_eq!(key, t0());

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.key, t0());
        assert_eq!(entry.enqueued_at, t0());
        assert_eq!(entry.payload.star_count, 12);
        assert!(entry.payload.text.ends_with("great post"));
    }

    #[test]
    fn test_enqueue_rejects_malformed_event() {
        let (handle, mut rx) = EnqueueHandle::channel(Extractor::new(Default::default()).unwrap());

        let err = handle.enqueue(&reaction("no author", None)).unwrap_err();
        assert!(matches!(err, EnqueueError::Extract(StarboardError::MalformedEvent { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_after_scheduler_stopped() {
        let (handle, rx) = EnqueueHandle::channel(Extractor::new(Default::default()).unwrap());
        drop(rx);

        let err = handle.enqueue(&reaction("late", Some("alice"))).unwrap_err();
        assert!(matches!(err, EnqueueError::SchedulerStopped));
    }

    #[test]
    fn test_drain_config_default() {
        let config = DrainConfig::default();
        assert_eq!(config.post_delay, chrono::Duration::minutes(5));
        assert_eq!(config.tick_interval, Duration::from_secs(30));
    }
}
