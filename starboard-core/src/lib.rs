//! Core types for the starboard cross-post relay
//!
//! This crate defines the domain shared by every other crate: the qualifying
//! chat events, the normalized post payload, the payload extractor, the
//! delay queue and the publishing seam. Nothing in here performs I/O.

pub mod config;
pub mod error;
pub mod event;
pub mod extract;
pub mod payload;
pub mod publisher;
pub mod queue;

pub use error::{PublishError, StarboardError, StarboardResult};
pub use event::{
    AttachmentInfo, EmbedInfo, EmbedKind, EventKey, MessageContent, OriginalAuthor,
    QualifyingEvent, ReactionEmoji, ReactionEvent, ReactionTally, RelayEvent,
};
pub use extract::{channel_mention_id, user_mention_ids, Extractor, StarEmoji};
pub use payload::{PostPayload, StarTier};
pub use publisher::{PostedStatus, StatusPublisher};
pub use queue::{DelayQueue, QueueEntry};
