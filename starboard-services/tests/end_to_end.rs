//! Qualifying event to published status, through extractor, queue, scheduler
//! and publisher adapter, with a scripted publisher standing in for Twitter.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use starboard_core::{
    AttachmentInfo, Extractor, MessageContent, OriginalAuthor, PostedStatus, PublishError,
    QualifyingEvent, QueueEntry, ReactionEmoji, ReactionEvent, ReactionTally, StarEmoji,
    StatusPublisher,
};
use starboard_services::{
    DrainConfig, DrainScheduler, EnqueueHandle, PublisherAdapter, TruncationPolicy,
};
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

struct ScriptedPublisher {
    results: Mutex<VecDeque<Result<PostedStatus, PublishError>>>,
    calls: Mutex<Vec<(String, Option<Url>)>>,
}

impl ScriptedPublisher {
    fn new(results: Vec<Result<PostedStatus, PublishError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Option<Url>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusPublisher for ScriptedPublisher {
    async fn publish(
        &self,
        text: &str,
        image_url: Option<&Url>,
    ) -> Result<PostedStatus, PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), image_url.cloned()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PostedStatus { id: "ok".to_string() }))
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap()
}

fn starred(stars: u64, text: &str, attachments: Vec<AttachmentInfo>) -> QualifyingEvent {
    QualifyingEvent::ReactionThreshold(ReactionEvent {
        message_timestamp: t0(),
        channel_name: "memes".to_string(),
        author: Some(OriginalAuthor::new(Some(42), "bob")),
        content: MessageContent {
            text: text.to_string(),
            attachments,
            ..Default::default()
        },
        reactions: vec![ReactionTally {
            emoji: ReactionEmoji::Unicode("\u{2B50}".to_string()),
            count: stars,
        }],
    })
}

fn photo() -> AttachmentInfo {
    AttachmentInfo {
        filename: "photo.png".to_string(),
        url: "https://cdn.discordapp.com/attachments/1/2/photo.png".to_string(),
    }
}

fn pipeline(
    publisher: Arc<ScriptedPublisher>,
) -> (EnqueueHandle, UnboundedReceiver<QueueEntry>, DrainScheduler) {
    let extractor = Extractor::new(StarEmoji::default()).unwrap();
    let (handle, rx) = EnqueueHandle::channel(extractor);
    let scheduler = DrainScheduler::new(
        PublisherAdapter::new(publisher, TruncationPolicy::new(140, 1)),
        DrainConfig {
            post_delay: Duration::minutes(5),
            tick_interval: std::time::Duration::from_secs(30),
        },
    );
    (handle, rx, scheduler)
}

#[tokio::test]
async fn test_image_only_post_uses_medium_tier_and_attachment() {
    let publisher = ScriptedPublisher::new(vec![]);
    let (handle, mut rx, mut scheduler) = pipeline(publisher.clone());

    handle.enqueue_at(&starred(12, "", vec![photo()]), t0()).unwrap();
    let entry = rx.try_recv().unwrap();
    assert!(entry.payload.text.starts_with("\u{1F31F} 12"));
    assert_eq!(entry.payload.image_url.as_ref().map(Url::as_str), Some(photo().url.as_str()));

    scheduler.accept(entry);
    scheduler.drain_due(t0() + Duration::minutes(6)).await;

    let calls = publisher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.as_ref().map(Url::as_str), Some(photo().url.as_str()));
}

#[tokio::test]
async fn test_thirty_stars_use_max_tier() {
    let publisher = ScriptedPublisher::new(vec![]);
    let (handle, mut rx, _) = pipeline(publisher);

    handle.enqueue_at(&starred(30, "legendary", vec![]), t0()).unwrap();
    let entry = rx.try_recv().unwrap();
    assert!(entry.payload.text.starts_with("\u{2728} 30"));
}

#[tokio::test]
async fn test_entry_is_published_only_after_delay() {
    let publisher = ScriptedPublisher::new(vec![]);
    let (handle, mut rx, mut scheduler) = pipeline(publisher.clone());

    handle.enqueue_at(&starred(10, "hello world", vec![]), t0()).unwrap();
    scheduler.accept(rx.try_recv().unwrap());

    let report = scheduler.drain_due(t0() + Duration::minutes(4)).await;
    assert_eq!(report.processed(), 0);
    assert_eq!(scheduler.queue().len(), 1);

    let report = scheduler.drain_due(t0() + Duration::minutes(6)).await;
    assert_eq!(report.published, 1);
    assert!(scheduler.queue().is_empty());
    assert_eq!(publisher.calls().len(), 1);
}

#[tokio::test]
async fn test_too_long_status_is_retried_once_then_removed() {
    let publisher = ScriptedPublisher::new(vec![
        Err(PublishError::ContentTooLong { length: 220 }),
        Err(PublishError::ContentTooLong { length: 139 }),
    ]);
    let (handle, mut rx, mut scheduler) = pipeline(publisher.clone());

    handle.enqueue_at(&starred(10, &"a".repeat(200), vec![]), t0()).unwrap();
    scheduler.accept(rx.try_recv().unwrap());

    let report = scheduler.drain_due(t0() + Duration::minutes(5)).await;
    assert_eq!(report.dropped, 1);
    assert!(scheduler.queue().is_empty());

    let calls = publisher.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].0.chars().count() > 200);
    assert_eq!(calls[1].0.chars().count(), 139);
    assert!(calls[0].0.starts_with(&calls[1].0));

    // Nothing left to retry on later ticks
    scheduler.drain_due(t0() + Duration::minutes(30)).await;
    assert_eq!(publisher.calls().len(), 2);
}
