//! X/Twitter integration for the starboard relay
//!
//! This crate provides a small client for the X API v2: verifying the
//! account's credentials, uploading an image, and posting a status. It
//! implements [`starboard_core::StatusPublisher`] so the relay can publish
//! through it without knowing the wire details.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::TwitterClient;
pub use config::TwitterConfig;
pub use error::TwitterError;
pub use types::{TweetData, TwitterUser};
