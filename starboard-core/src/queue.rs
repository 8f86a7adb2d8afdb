//! Delay queue of pending posts
//!
//! Entries are keyed by the originating message timestamp and become due once
//! the settle delay has passed since they were enqueued. The queue is plain
//! owned state; whoever owns it serializes access.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::event::EventKey;
use crate::payload::PostPayload;

/// A payload waiting for its delay to elapse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: EventKey,
    pub payload: PostPayload,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(key: EventKey, payload: PostPayload, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            key,
            payload,
            enqueued_at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>, delay: Duration) -> bool {
        self.enqueued_at + delay <= now
    }
}

/// Pending posts ordered by key
#[derive(Debug, Default)]
pub struct DelayQueue {
    entries: BTreeMap<EventKey, QueueEntry>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `payload` under `key`
    ///
    /// An existing entry with the same key is replaced and returned; the last
    /// write wins.
    pub fn insert(
        &mut self,
        key: EventKey,
        payload: PostPayload,
        enqueued_at: DateTime<Utc>,
    ) -> Option<QueueEntry> {
        self.entries
            .insert(key, QueueEntry::new(key, payload, enqueued_at))
    }

    /// Insert a ready-made entry, same semantics as [`DelayQueue::insert`]
    pub fn insert_entry(&mut self, entry: QueueEntry) -> Option<QueueEntry> {
        self.entries.insert(entry.key, entry)
    }

    /// Entries whose delay has elapsed at `now`, oldest key first
    ///
    /// Lazy and finite. Calling it again recomputes from the current contents.
    pub fn due_items(
        &self,
        now: DateTime<Utc>,
        delay: Duration,
    ) -> impl Iterator<Item = &QueueEntry> + '_ {
        self.entries
            .values()
            .filter(move |entry| entry.is_due(now, delay))
    }

    /// Remove the entry at `key`; absent keys are a no-op
    pub fn remove(&mut self, key: &EventKey) -> Option<QueueEntry> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &EventKey) -> Option<&QueueEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
