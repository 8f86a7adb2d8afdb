//! Convert Discord messages to qualifying events

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use starboard_core::{
    user_mention_ids, AttachmentInfo, EmbedInfo, EmbedKind, MessageContent, OriginalAuthor,
    ReactionEmoji, ReactionEvent, ReactionTally, RelayEvent,
};
use twilight_model::channel::message::{Embed, EmojiReactionType};
use twilight_model::channel::{Attachment, Message};
use twilight_model::util::Timestamp;

/// Build a reaction-threshold event from a freshly fetched message
///
/// # Arguments
/// * `message` - The starred message, fetched after the reaction arrived
/// * `channel_name` - Name of the channel the message lives in
pub fn reaction_event(message: &Message, channel_name: String) -> ReactionEvent {
    let nick = message.member.as_ref().and_then(|m| m.nick.as_deref());
    let author = OriginalAuthor::new(
        Some(message.author.id.get()),
        member_display_name(nick, message.author.global_name.as_deref(), &message.author.name),
    );

    let mentions = message
        .mentions
        .iter()
        .map(|mention| {
            let nick = mention.member.as_ref().and_then(|m| m.nick.as_deref());
            (mention.id.get(), member_display_name(nick, None, &mention.name))
        })
        .collect();

    ReactionEvent {
        message_timestamp: timestamp_to_datetime(message.timestamp),
        channel_name,
        author: Some(author),
        content: MessageContent {
            text: message.content.clone(),
            embeds: message.embeds.iter().map(embed_info).collect(),
            attachments: message.attachments.iter().map(attachment_info).collect(),
            mentions,
        },
        reactions: message
            .reactions
            .iter()
            .map(|reaction| ReactionTally {
                emoji: reaction_emoji(&reaction.emoji),
                count: reaction.count,
            })
            .collect(),
    }
}

/// Build a relay event from a starboard bot's message
///
/// The relayed message lives in the bot's first embed: author block, description
/// and image. The message content is the bot's annotation line.
///
/// # Arguments
/// * `message` - The relay bot's message
/// * `channel_name` - Origin channel resolved from the annotation, if any
/// * `mentions` - Display names for the ids in [`relay_mention_ids`]
pub fn relay_event(
    message: &Message,
    channel_name: Option<String>,
    mentions: HashMap<u64, String>,
) -> RelayEvent {
    let relayed = message.embeds.first();

    let author = relayed
        .and_then(|embed| embed.author.as_ref())
        .map(|author| OriginalAuthor::new(None, author.name.clone()));

    let text = relayed
        .and_then(|embed| embed.description.clone())
        .unwrap_or_default();

    RelayEvent {
        relay_timestamp: timestamp_to_datetime(message.timestamp),
        original_timestamp: relayed
            .and_then(|embed| embed.timestamp)
            .map(timestamp_to_datetime),
        annotation: message.content.clone(),
        channel_name,
        author,
        content: MessageContent {
            text,
            embeds: message.embeds.iter().map(embed_info).collect(),
            attachments: message.attachments.iter().map(attachment_info).collect(),
            mentions,
        },
    }
}

/// User ids mentioned in a relayed message body
pub fn relay_mention_ids(message: &Message) -> Vec<u64> {
    message
        .embeds
        .first()
        .and_then(|embed| embed.description.as_deref())
        .map(user_mention_ids)
        .unwrap_or_default()
}

pub fn reaction_emoji(emoji: &EmojiReactionType) -> ReactionEmoji {
    match emoji {
        EmojiReactionType::Custom { id, name, .. } => ReactionEmoji::Custom {
            id: id.get(),
            name: name.clone(),
        },
        EmojiReactionType::Unicode { name } => ReactionEmoji::Unicode(name.clone()),
    }
}

/// Nickname, then global name, then username
pub fn member_display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    nick.filter(|n| !n.is_empty())
        .or(global_name.filter(|n| !n.is_empty()))
        .unwrap_or(username)
        .to_string()
}

fn embed_info(embed: &Embed) -> EmbedInfo {
    EmbedInfo {
        kind: EmbedKind::from_discord(&embed.kind),
        url: embed.url.clone(),
        image_url: embed.image.as_ref().map(|image| image.url.clone()),
    }
}

fn attachment_info(attachment: &Attachment) -> AttachmentInfo {
    AttachmentInfo {
        filename: attachment.filename.clone(),
        url: attachment.url.clone(),
    }
}

/// Convert Discord timestamp to chrono DateTime
fn timestamp_to_datetime(timestamp: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(timestamp.as_micros()).unwrap_or_else(Utc::now)
}
