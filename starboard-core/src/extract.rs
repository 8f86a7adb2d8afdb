//! Payload extraction
//!
//! Turns a [`QualifyingEvent`] into a [`PostPayload`]: reads the star count,
//! picks the image, sanitizes mentions and composes the status text. Pure, so
//! the listener can call it synchronously at enqueue time.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::error::{StarboardError, StarboardResult};
use crate::event::{AttachmentInfo, QualifyingEvent, ReactionEmoji, ReactionTally};
use crate::payload::{compose_status, PostPayload};

/// File extensions treated as postable images
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

const ZERO_WIDTH_SPACE: char = '\u{200B}';

static RE_USER_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@!?(\d+)>").unwrap());
static RE_CHANNEL_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<#(\d+)>").unwrap());

/// The emoji that counts as a star
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarEmoji {
    /// Guild custom emoji, by id
    Custom(u64),
    /// Standard unicode emoji
    Unicode(String),
}

impl StarEmoji {
    pub fn matches(&self, emoji: &ReactionEmoji) -> bool {
        match (self, emoji) {
            (StarEmoji::Custom(want), ReactionEmoji::Custom { id, .. }) => want == id,
            (StarEmoji::Unicode(want), ReactionEmoji::Unicode(name)) => {
                strip_variation_selector(want) == strip_variation_selector(name)
            }
            _ => false,
        }
    }

    /// Regex source matching this emoji as it appears in message text
    fn text_pattern(&self) -> String {
        match self {
            StarEmoji::Custom(id) => format!(r"<a?:\w+:{}>", id),
            StarEmoji::Unicode(name) => {
                format!(r"{}\x{{FE0F}}?", regex::escape(strip_variation_selector(name)))
            }
        }
    }
}

impl Default for StarEmoji {
    fn default() -> Self {
        StarEmoji::Unicode("\u{2B50}".to_string())
    }
}

impl FromStr for StarEmoji {
    type Err = String;

    /// Accepts a bare emoji id, a `<:name:id>` token, or a unicode emoji
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("emoji is empty".to_string());
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            return s
                .parse::<u64>()
                .map(StarEmoji::Custom)
                .map_err(|e| e.to_string());
        }
        if s.starts_with('<') && s.ends_with('>') {
            let id = s
                .trim_end_matches('>')
                .rsplit(':')
                .next()
                .ok_or_else(|| format!("malformed custom emoji {}", s))?;
            return id
                .parse::<u64>()
                .map(StarEmoji::Custom)
                .map_err(|_| format!("malformed custom emoji {}", s));
        }
        Ok(StarEmoji::Unicode(s.to_string()))
    }
}

fn strip_variation_selector(s: &str) -> &str {
    s.trim_end_matches('\u{FE0F}')
}

/// Builds post payloads from qualifying events
#[derive(Debug, Clone)]
pub struct Extractor {
    star_emoji: StarEmoji,
    annotation_count: Regex,
}

impl Extractor {
    pub fn new(star_emoji: StarEmoji) -> StarboardResult<Self> {
        let annotation_count = Regex::new(&format!(
            r"{}\s*\**\s*(\d+)",
            star_emoji.text_pattern()
        ))
        .map_err(|e| StarboardError::configuration("STARBOARD_STAR_EMOJI", e.to_string()))?;

        Ok(Self {
            star_emoji,
            annotation_count,
        })
    }

    /// Build the payload for `event`
    ///
    /// Fails with [`StarboardError::MalformedEvent`] when the author, the
    /// origin channel, or any postable content is missing.
    pub fn extract(&self, event: &QualifyingEvent) -> StarboardResult<PostPayload> {
        let (star_count, channel) = match event {
            QualifyingEvent::ReactionThreshold(e) => {
                (self.reaction_count(&e.reactions), Some(e.channel_name.as_str()))
            }
            QualifyingEvent::Relay(e) => {
                (self.annotation_count(&e.annotation), e.channel_name.as_deref())
            }
        };

        let channel = channel
            .map(|c| c.trim().trim_start_matches('#'))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StarboardError::malformed("channel name"))?;

        let author = event
            .author()
            .filter(|a| !a.display_name.trim().is_empty())
            .ok_or_else(|| StarboardError::malformed("author"))?;

        let content = event.content();
        let author_name = escape_broadcasts(&author.display_name);
        let mut body = self.sanitize(&content.text, &content.mentions);

        // Embedded images win over attachments
        let mut image_url = content
            .embeds
            .iter()
            .filter_map(|embed| embed.image())
            .find_map(parse_http_url);

        if let Some(attachment) = content.attachments.first() {
            if is_image_attachment(attachment) {
                if image_url.is_none() {
                    image_url = parse_http_url(&attachment.url);
                }
            } else if body.is_empty() {
                body = attachment.url.clone();
            } else {
                body = format!("{}\n{}", body, attachment.url);
            }
        }

        if body.trim().is_empty() && image_url.is_none() {
            return Err(StarboardError::malformed("message text or embed"));
        }

        Ok(PostPayload {
            text: compose_status(star_count, channel, &author_name, &body),
            image_url,
            star_count,
            channel: channel.to_string(),
            author: author.clone(),
        })
    }

    /// Count of the star reaction, zero when nobody used it
    pub fn reaction_count(&self, reactions: &[ReactionTally]) -> u64 {
        reactions
            .iter()
            .find(|r| self.star_emoji.matches(&r.emoji))
            .map(|r| r.count)
            .unwrap_or(0)
    }

    /// Count written next to the star in a relay annotation, zero if absent
    pub fn annotation_count(&self, annotation: &str) -> u64 {
        self.annotation_count
            .captures(annotation)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0)
    }

    /// Make message text safe to repost
    ///
    /// `<@id>` tokens become `@name` when the name is known. Broadcast tokens
    /// get a zero-width space after the `@` so they render the same but no
    /// longer notify anyone.
    pub fn sanitize(&self, text: &str, mentions: &HashMap<u64, String>) -> String {
        let resolved = RE_USER_MENTION.replace_all(text, |caps: &Captures| {
            caps[1]
                .parse::<u64>()
                .ok()
                .and_then(|id| mentions.get(&id))
                .map(|name| format!("@{}", name))
                .unwrap_or_else(|| caps[0].to_string())
        });
        escape_broadcasts(&resolved)
    }
}

/// Defuse `@everyone` and `@here`
pub fn escape_broadcasts(text: &str) -> String {
    text.replace("@everyone", &format!("@{}everyone", ZERO_WIDTH_SPACE))
        .replace("@here", &format!("@{}here", ZERO_WIDTH_SPACE))
}

/// Channel id from the first `<#id>` mention in `text`
pub fn channel_mention_id(text: &str) -> Option<u64> {
    RE_CHANNEL_MENTION
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Ids of every `<@id>` / `<@!id>` mention in `text`, in order, deduplicated
pub fn user_mention_ids(text: &str) -> Vec<u64> {
    let mut ids: Vec<u64> = Vec::new();
    for caps in RE_USER_MENTION.captures_iter(text) {
        if let Ok(id) = caps[1].parse::<u64>() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

fn has_image_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Judged by the URL path (query string ignored), then by the file name
fn is_image_attachment(attachment: &AttachmentInfo) -> bool {
    let by_path = Url::parse(&attachment.url)
        .map(|url| has_image_extension(url.path()))
        .unwrap_or(false);
    by_path || has_image_extension(&attachment.filename)
}

fn parse_http_url(raw: &str) -> Option<Url> {
    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}
