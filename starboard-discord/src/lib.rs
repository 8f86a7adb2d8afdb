//! Discord integration for the starboard relay
//!
//! This crate holds the chat-side helpers: configuration for the watched
//! channel and trigger mode, a thin HTTP client for the lookups the listener
//! needs, and conversion of twilight models into core qualifying events.

pub mod client;
pub mod config;
pub mod convert;

pub use client::{DiscordClient, DiscordClientError};
pub use config::{DiscordConfig, StarboardMode};
pub use convert::{reaction_emoji, reaction_event, relay_event, relay_mention_ids};
