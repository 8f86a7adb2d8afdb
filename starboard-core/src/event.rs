//! Qualifying chat events
//!
//! The chat collaborator raises one of two event shapes depending on how the
//! deployment is wired: a reaction count crossing the threshold on a watched
//! channel, or a relay message posted by a known starboard bot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique key of a queued post: the timestamp of the originating message
pub type EventKey = DateTime<Utc>;

/// Identity of the person who wrote the starred message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalAuthor {
    /// Chat user id, when the event source knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Name rendered in the post
    pub display_name: String,
}

impl OriginalAuthor {
    pub fn new(id: Option<u64>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Emoji of a reaction as seen on the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionEmoji {
    Custom { id: u64, name: Option<String> },
    Unicode(String),
}

/// Count of one reaction on a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    pub emoji: ReactionEmoji,
    pub count: u64,
}

/// Embed kinds extraction cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedKind {
    /// A bare image link unfurled by the chat client
    Image,
    /// A bot-authored embed, which may carry an image block
    Rich,
    Other(String),
}

impl EmbedKind {
    pub fn from_discord(kind: &str) -> Self {
        match kind {
            "image" => EmbedKind::Image,
            "rich" => EmbedKind::Rich,
            other => EmbedKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedInfo {
    pub kind: EmbedKind,
    /// Link the embed points at (for image embeds, the image itself)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// URL of the embed's image block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl EmbedInfo {
    /// The explicit image this embed carries, if any
    pub fn image(&self) -> Option<&str> {
        match self.kind {
            EmbedKind::Image => self.url.as_deref().or(self.image_url.as_deref()),
            _ => self.image_url.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub url: String,
}

/// The postable parts of a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Raw message text, mention tokens included
    pub text: String,
    #[serde(default)]
    pub embeds: Vec<EmbedInfo>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
    /// user id -> display name for every user mentioned in `text`
    #[serde(default)]
    pub mentions: HashMap<u64, String>,
}

/// A message in a watched channel whose star reactions crossed the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub message_timestamp: DateTime<Utc>,
    pub channel_name: String,
    pub author: Option<OriginalAuthor>,
    pub content: MessageContent,
    #[serde(default)]
    pub reactions: Vec<ReactionTally>,
}

/// A starboard bot's relay of a starred message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEvent {
    /// When the relay bot posted
    pub relay_timestamp: DateTime<Utc>,
    /// When the starred message was originally posted, if the relay says
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_timestamp: Option<DateTime<Utc>>,
    /// The bot's annotation line, e.g. `⭐ **12** <#1234>`
    pub annotation: String,
    /// Origin channel, resolved from the annotation's channel mention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    pub author: Option<OriginalAuthor>,
    /// The relayed message body and media
    pub content: MessageContent,
}

/// An event that should produce a cross-post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualifyingEvent {
    ReactionThreshold(ReactionEvent),
    Relay(RelayEvent),
}

impl QualifyingEvent {
    /// Queue key for this event. Relays of the same original message share it.
    pub fn key(&self) -> EventKey {
        match self {
            QualifyingEvent::ReactionThreshold(event) => event.message_timestamp,
            QualifyingEvent::Relay(event) => {
                event.original_timestamp.unwrap_or(event.relay_timestamp)
            }
        }
    }

    pub fn author(&self) -> Option<&OriginalAuthor> {
        match self {
            QualifyingEvent::ReactionThreshold(event) => event.author.as_ref(),
            QualifyingEvent::Relay(event) => event.author.as_ref(),
        }
    }

    pub fn content(&self) -> &MessageContent {
        match self {
            QualifyingEvent::ReactionThreshold(event) => &event.content,
            QualifyingEvent::Relay(event) => &event.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_relay_key_prefers_original_timestamp() {
        let original = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let relayed = Utc.with_ymd_and_hms(2024, 3, 1, 12, 7, 0).unwrap();

        let mut event = RelayEvent {
            relay_timestamp: relayed,
            original_timestamp: Some(original),
            annotation: String::new(),
            channel_name: None,
            author: None,
            content: MessageContent::default(),
        };
        assert_eq!(QualifyingEvent::Relay(event.clone()).key(), original);

        event.original_timestamp = None;
        assert_eq!(QualifyingEvent::Relay(event).key(), relayed);
    }

    #[test]
    fn test_embed_image() {
        let image = EmbedInfo {
            kind: EmbedKind::Image,
            url: Some("https://cdn.example.com/a.png".to_string()),
            image_url: None,
        };
        assert_eq!(image.image(), Some("https://cdn.example.com/a.png"));

        let rich_without_image = EmbedInfo {
            kind: EmbedKind::Rich,
            url: Some("https://example.com/article".to_string()),
            image_url: None,
        };
        assert_eq!(rich_without_image.image(), None);

        assert_eq!(EmbedKind::from_discord("gifv"), EmbedKind::Other("gifv".to_string()));
    }
}
