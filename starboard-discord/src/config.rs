//! Discord integration configuration

use std::str::FromStr;

use starboard_core::config::{optional_env, parse_snowflake, parse_value};
use starboard_core::{StarEmoji, StarboardError, StarboardResult};

/// How qualifying events are detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarboardMode {
    /// Star reactions on messages in the watched channel cross the threshold
    Reaction,
    /// A starboard bot relays starred messages into the watched channel
    Relay { bot_id: u64 },
}

/// Configuration for the Discord side of the relay
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Discord bot token for authentication
    pub bot_token: String,
    pub mode: StarboardMode,
    /// Watched channel (reaction mode) or relay channel (relay mode)
    pub channel_id: u64,
    pub star_emoji: StarEmoji,
    /// Minimum star reactions before a message qualifies
    pub reaction_threshold: u64,
}

impl DiscordConfig {
    /// Load Discord configuration from environment variables
    ///
    /// Expects:
    /// - DISCORD_BOT_TOKEN: Discord bot token
    /// - STARBOARD_CHANNEL_ID: watched or relay channel id
    /// - STARBOARD_MODE: `reaction` (default) or `relay`
    /// - STARBOARD_RELAY_BOT_ID: relay bot user id, relay mode only
    /// - STARBOARD_STAR_EMOJI: custom emoji id or unicode emoji (default ⭐)
    /// - STARBOARD_REACTION_THRESHOLD: default 10
    pub fn from_env() -> StarboardResult<Self> {
        Self::from_lookup(optional_env)
    }

    /// Build the configuration from any key -> value source
    pub fn from_lookup<F>(lookup: F) -> StarboardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| StarboardError::configuration(key, "not set"))
        };

        let bot_token = required("DISCORD_BOT_TOKEN")?;
        let channel_id = parse_snowflake("STARBOARD_CHANNEL_ID", &required("STARBOARD_CHANNEL_ID")?)?;

        let mode = match lookup("STARBOARD_MODE")
            .unwrap_or_else(|| "reaction".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "reaction" => StarboardMode::Reaction,
            "relay" => {
                let bot_id = parse_snowflake(
                    "STARBOARD_RELAY_BOT_ID",
                    &required("STARBOARD_RELAY_BOT_ID")?,
                )?;
                StarboardMode::Relay { bot_id }
            }
            other => {
                return Err(StarboardError::configuration(
                    "STARBOARD_MODE",
                    format!("unknown mode {:?}, expected reaction or relay", other),
                ))
            }
        };

        let star_emoji = match lookup("STARBOARD_STAR_EMOJI") {
            Some(raw) => StarEmoji::from_str(&raw)
                .map_err(|e| StarboardError::configuration("STARBOARD_STAR_EMOJI", e))?,
            None => StarEmoji::default(),
        };

        let reaction_threshold = match lookup("STARBOARD_REACTION_THRESHOLD") {
            Some(raw) => parse_value("STARBOARD_REACTION_THRESHOLD", &raw)?,
            None => default_reaction_threshold(),
        };

        Ok(Self {
            bot_token,
            mode,
            channel_id,
            star_emoji,
            reaction_threshold,
        })
    }

    pub fn is_watched_channel(&self, channel_id: u64) -> bool {
        self.channel_id == channel_id
    }

    /// Whether a message by `author_id` in `channel_id` is a relay to act on
    pub fn is_relay_message(&self, channel_id: u64, author_id: u64) -> bool {
        match self.mode {
            StarboardMode::Relay { bot_id } => self.is_watched_channel(channel_id) && author_id == bot_id,
            StarboardMode::Reaction => false,
        }
    }
}

fn default_reaction_threshold() -> u64 {
    10
}
