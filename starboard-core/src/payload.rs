//! Normalized post payload and star tiers

use serde::{Deserialize, Serialize};
use url::Url;

use crate::event::OriginalAuthor;

/// Display tier derived from a star count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StarTier {
    /// 0..=10
    Low,
    /// 11..=14
    Medium,
    /// 15..=24
    High,
    /// 25 and up
    Max,
}

impl StarTier {
    pub const MEDIUM_FROM: u64 = 11;
    pub const HIGH_FROM: u64 = 15;
    pub const MAX_FROM: u64 = 25;

    pub fn from_count(count: u64) -> Self {
        match count {
            c if c >= Self::MAX_FROM => StarTier::Max,
            c if c >= Self::HIGH_FROM => StarTier::High,
            c if c >= Self::MEDIUM_FROM => StarTier::Medium,
            _ => StarTier::Low,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            StarTier::Low => "\u{2B50}",     // white medium star
            StarTier::Medium => "\u{1F31F}", // glowing star
            StarTier::High => "\u{1F4AB}",   // dizzy symbol
            StarTier::Max => "\u{2728}",     // sparkles
        }
    }
}

/// A status ready to be cross-posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPayload {
    /// Fully composed status body, never empty
    pub text: String,
    /// Direct link to an image to attach
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Url>,
    pub star_count: u64,
    /// Origin channel name without the leading `#`
    pub channel: String,
    pub author: OriginalAuthor,
}

impl PostPayload {
    pub fn tier(&self) -> StarTier {
        StarTier::from_count(self.star_count)
    }
}

/// Compose the status text
///
/// Layout: `"{tier emoji} {count}: #{channel}\n{author}\n\n{body}"`.
pub fn compose_status(star_count: u64, channel: &str, author: &str, body: &str) -> String {
    format!(
        "{} {}: #{}\n{}\n\n{}",
        StarTier::from_count(star_count).emoji(),
        star_count,
        channel,
        author,
        body
    )
}
