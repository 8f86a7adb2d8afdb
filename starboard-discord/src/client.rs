//! Discord API client wrapper

use std::sync::Arc;

use twilight_http::Client as HttpClient;
use twilight_model::channel::Message;
use twilight_model::id::{
    marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker},
    Id,
};

use crate::convert::member_display_name;

/// Discord client for the lookups the listener needs
#[derive(Clone)]
pub struct DiscordClient {
    http: Arc<HttpClient>,
}

impl DiscordClient {
    /// Create a new Discord client
    pub fn new(token: String) -> Self {
        Self {
            http: Arc::new(HttpClient::new(token)),
        }
    }

    /// Fetch a message with its current reactions, attachments and embeds
    pub async fn get_message(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
    ) -> Result<Message, DiscordClientError> {
        self.http
            .message(channel_id, message_id)
            .await
            .map_err(|e| DiscordClientError::HttpError(e.to_string()))?
            .model()
            .await
            .map_err(|e| DiscordClientError::DeserializationError(e.to_string()))
    }

    /// Get channel name
    pub async fn get_channel_name(&self, channel_id: Id<ChannelMarker>) -> Result<String, DiscordClientError> {
        let channel = self.http
            .channel(channel_id)
            .await
            .map_err(|e| DiscordClientError::HttpError(e.to_string()))?
            .model()
            .await
            .map_err(|e| DiscordClientError::DeserializationError(e.to_string()))?;

        Ok(channel.name.unwrap_or_else(|| "unknown".to_string()))
    }

    /// Name a guild member is shown as: nickname, then global name, then username
    pub async fn get_member_display_name(
        &self,
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<String, DiscordClientError> {
        let member = self.http
            .guild_member(guild_id, user_id)
            .await
            .map_err(|e| DiscordClientError::HttpError(e.to_string()))?
            .model()
            .await
            .map_err(|e| DiscordClientError::DeserializationError(e.to_string()))?;

        Ok(member_display_name(
            member.nick.as_deref(),
            member.user.global_name.as_deref(),
            &member.user.name,
        ))
    }
}

/// Errors that can occur when using the Discord client
#[derive(Debug, thiserror::Error)]
pub enum DiscordClientError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
