//! Error types for the X/Twitter client

use starboard_core::PublishError;
use thiserror::Error;

/// Errors that can occur talking to the X API
#[derive(Debug, Error)]
pub enum TwitterError {
    /// HTTP request failed before a response arrived
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// API returned an error response
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The status text exceeds the platform limit
    #[error("Status text too long ({length} characters)")]
    TooLong { length: usize },

    /// Downloading or uploading the image failed
    #[error("Media error: {0}")]
    Media(String),

    /// Failed to parse API response
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<TwitterError> for PublishError {
    fn from(err: TwitterError) -> Self {
        match err {
            TwitterError::RequestFailed(msg) => PublishError::network(msg),
            TwitterError::ApiError { status, message } => PublishError::rejected(status, message),
            TwitterError::TooLong { length } => PublishError::ContentTooLong { length },
            TwitterError::Media(msg) => PublishError::media(msg),
            TwitterError::ParseError(msg) => PublishError::parse(msg),
        }
    }
}
