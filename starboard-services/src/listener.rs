//! Starboard listener
//!
//! Connects to the Discord Gateway and turns the events of the configured
//! mode into qualifying events for the [`EnqueueHandle`]: star reactions
//! crossing the threshold in reaction mode, relay bot posts in relay mode.

use std::collections::HashMap;
use std::sync::Arc;

use starboard_core::{channel_mention_id, QualifyingEvent};
use starboard_discord::{
    reaction_emoji, reaction_event, relay_event, relay_mention_ids, DiscordClient, DiscordConfig,
    StarboardMode,
};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use twilight_gateway::{Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _};
use twilight_model::channel::Message;
use twilight_model::gateway::payload::incoming::{MessageCreate, ReactionAdd};
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};
use twilight_model::id::Id;

use crate::scheduler::{EnqueueError, EnqueueHandle};

/// Gateway-facing event source
pub struct StarboardListener {
    config: DiscordConfig,
    discord_client: DiscordClient,
    enqueue: EnqueueHandle,
    /// Flipped to true once the gateway session is live
    ready: watch::Sender<bool>,
    /// Cache of channel_id -> channel_name
    channel_names: RwLock<HashMap<u64, String>>,
}

impl StarboardListener {
    pub fn new(config: DiscordConfig, enqueue: EnqueueHandle, ready: watch::Sender<bool>) -> Self {
        let discord_client = DiscordClient::new(config.bot_token.clone());

        Self {
            config,
            discord_client,
            enqueue,
            ready,
            channel_names: RwLock::new(HashMap::new()),
        }
    }

    /// Run the gateway event loop
    ///
    /// The shard reconnects on its own. The loop only ends when the shard
    /// gives up, which the caller should treat as fatal.
    pub async fn start(self: Arc<Self>) -> Result<(), ListenerError> {
        info!(mode = ?self.config.mode, channel_id = self.config.channel_id, "Connecting to Discord Gateway...");

        let intents = match self.config.mode {
            StarboardMode::Reaction => Intents::GUILD_MESSAGE_REACTIONS,
            StarboardMode::Relay { .. } => Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT,
        };
        let wanted = EventTypeFlags::READY | EventTypeFlags::MESSAGE_CREATE | EventTypeFlags::REACTION_ADD;

        // One shard is plenty for a single watched channel
        let mut shard = Shard::new(ShardId::ONE, self.config.bot_token.clone(), intents);

        while let Some(item) = shard.next_event(wanted).await {
            let event = match item {
                Ok(event) => event,
                Err(source) => {
                    warn!(?source, "Error receiving gateway event");
                    continue;
                }
            };

            match event {
                Event::Ready(ready) => {
                    info!(user = %ready.user.name, "Discord Gateway connected");
                    self.ready.send_replace(true);
                }
                Event::ReactionAdd(reaction) => {
                    self.handle_reaction_add(&reaction).await;
                }
                Event::MessageCreate(message) => {
                    self.handle_message_create(&message).await;
                }
                _ => {}
            }
        }

        Err(ListenerError::GatewayClosed)
    }

    /// Reaction mode: enqueue once the star count reaches the threshold
    async fn handle_reaction_add(&self, reaction: &ReactionAdd) {
        if self.config.mode != StarboardMode::Reaction {
            return;
        }
        if !self.config.is_watched_channel(reaction.channel_id.get()) {
            return;
        }
        if !self.config.star_emoji.matches(&reaction_emoji(&reaction.emoji)) {
            return;
        }

        // The gateway event has no totals, so fetch the message with its reactions
        let message = match self
            .discord_client
            .get_message(reaction.channel_id, reaction.message_id)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(message_id = reaction.message_id.get(), error = %e, "Failed to fetch starred message");
                return;
            }
        };

        let stars = star_count(&self.config, &message);
        if stars < self.config.reaction_threshold {
            debug!(message_id = message.id.get(), stars, "Below reaction threshold");
            return;
        }

        let channel_name = self.channel_name(message.channel_id).await;
        let event = QualifyingEvent::ReactionThreshold(reaction_event(&message, channel_name));
        self.submit(&event, message.id.get());
    }

    /// Relay mode: enqueue every post the relay bot makes in the relay channel
    async fn handle_message_create(&self, message: &MessageCreate) {
        if !self
            .config
            .is_relay_message(message.channel_id.get(), message.author.id.get())
        {
            return;
        }

        let channel_name = match channel_mention_id(&message.content).and_then(Id::new_checked) {
            Some(channel_id) => Some(self.channel_name(channel_id).await),
            None => None,
        };

        let mentions = match message.guild_id {
            Some(guild_id) => self.resolve_mentions(guild_id, message).await,
            None => HashMap::new(),
        };

        let event = QualifyingEvent::Relay(relay_event(message, channel_name, mentions));
        self.submit(&event, message.id.get());
    }

    fn submit(&self, event: &QualifyingEvent, message_id: u64) {
        match self.enqueue.enqueue(event) {
            Ok(key) => debug!(message_id, %key, "Qualifying event enqueued"),
            // Already logged by the handle
            Err(EnqueueError::Extract(_)) => {}
            Err(e @ EnqueueError::SchedulerStopped) => {
                warn!(message_id, error = %e, "Qualifying event lost");
            }
        }
    }

    /// Display names for the users mentioned in a relayed message
    async fn resolve_mentions(&self, guild_id: Id<GuildMarker>, message: &Message) -> HashMap<u64, String> {
        let mut names = HashMap::new();
        for user_id in relay_mention_ids(message) {
            let Some(id) = Id::<UserMarker>::new_checked(user_id) else {
                continue;
            };
            match self.discord_client.get_member_display_name(guild_id, id).await {
                Ok(name) => {
                    names.insert(user_id, name);
                }
                Err(e) => {
                    debug!(user_id, error = %e, "Could not resolve mentioned member");
                }
            }
        }
        names
    }

    /// Get channel name from cache or fetch it
    async fn channel_name(&self, channel_id: Id<ChannelMarker>) -> String {
        if let Some(name) = self.channel_names.read().await.get(&channel_id.get()) {
            return name.clone();
        }

        match self.discord_client.get_channel_name(channel_id).await {
            Ok(name) => {
                self.channel_names
                    .write()
                    .await
                    .insert(channel_id.get(), name.clone());
                name
            }
            Err(e) => {
                warn!(channel_id = channel_id.get(), error = %e, "Failed to fetch channel name");
                "unknown".to_string()
            }
        }
    }
}

/// Count of the configured star emoji on `message`
fn star_count(config: &DiscordConfig, message: &Message) -> u64 {
    message
        .reactions
        .iter()
        .find(|reaction| config.star_emoji.matches(&reaction_emoji(&reaction.emoji)))
        .map(|reaction| reaction.count)
        .unwrap_or(0)
}

/// Errors that end the listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Discord Gateway connection closed and will not reconnect")]
    GatewayClosed,
}
