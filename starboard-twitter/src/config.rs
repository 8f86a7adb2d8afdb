//! X/Twitter configuration

use starboard_core::config::{optional_env, parse_env_or, required_env};
use starboard_core::StarboardResult;

/// Default API base for X API v2
pub const DEFAULT_API_BASE: &str = "https://api.x.com/2";

/// Configuration for the X/Twitter publisher
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    /// OAuth 2.0 user-context access token for the posting account
    pub access_token: String,
    pub api_base: String,
    /// Status length limit, in characters
    pub max_status_chars: usize,
    /// Characters kept free below the limit when truncating
    pub truncation_margin: usize,
}

impl TwitterConfig {
    /// Load configuration from environment variables
    ///
    /// Expects:
    /// - TWITTER_ACCESS_TOKEN: access token (required)
    /// - TWITTER_API_BASE: API base URL (optional)
    /// - TWITTER_MAX_STATUS_CHARS: length limit (optional, default 140)
    /// - TWITTER_TRUNCATION_MARGIN: safety margin (optional, default 1)
    pub fn from_env() -> StarboardResult<Self> {
        let access_token = required_env("TWITTER_ACCESS_TOKEN")?;
        let api_base = optional_env("TWITTER_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            access_token,
            api_base,
            max_status_chars: parse_env_or("TWITTER_MAX_STATUS_CHARS", default_max_status_chars())?,
            truncation_margin: parse_env_or("TWITTER_TRUNCATION_MARGIN", default_truncation_margin())?,
        })
    }
}

fn default_max_status_chars() -> usize {
    140
}

fn default_truncation_margin() -> usize {
    1
}
