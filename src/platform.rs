use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::error::BotError;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A plain chat message.
    Regular,
    Other,
}

/// Owned snapshot of an inbound chat message.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub author_id: u64,
    pub author_is_bot: bool,
    pub kind: MessageKind,
    pub content: String,
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    /// Users mentioned with structured markup.
    pub mentions: Vec<u64>,
    /// Set for `@everyone` and `@here` pings.
    pub mentions_everyone: bool,
}

impl IncomingMessage {
    /// Whether `user_id` is pinged by this message, directly or through `@everyone`.
    pub fn mentions_user(&self, user_id: u64) -> bool {
        self.mentions_everyone || self.mentions.contains(&user_id)
    }
}

impl From<&serenity::Message> for IncomingMessage {
    fn from(message: &serenity::Message) -> Self {
        let kind = if message.kind == serenity::MessageType::Regular {
            MessageKind::Regular
        } else {
            MessageKind::Other
        };
        Self {
            author_id: message.author.id.get(),
            author_is_bot: message.author.bot,
            kind,
            content: message.content.clone(),
            channel_id: message.channel_id.get(),
            guild_id: message.guild_id.map(|id| id.get()),
            mentions: message.mentions.iter().map(|u| u.id.get()).collect(),
            mentions_everyone: message.mention_everyone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: u64,
    pub name: String,
}

impl BotIdentity {
    /// The canonical mention token for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildEmoji {
    pub name: String,
    pub id: u64,
    pub animated: bool,
}

impl GuildEmoji {
    pub fn token(&self) -> String {
        if self.animated {
            format!("<a:{}:{}>", self.name, self.id)
        } else {
            format!("<:{}:{}>", self.name, self.id)
        }
    }
}

/// Everything the dispatcher needs from the chat service.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    fn bot(&self) -> BotIdentity;

    fn member_display_name(&self, guild_id: Option<u64>, user_id: u64) -> Option<String>;

    fn guild_emojis(&self, guild_id: Option<u64>) -> Vec<GuildEmoji>;

    fn set_activity(&self, status: &str);

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), BotError>;

    async fn broadcast_typing(&self, channel_id: u64);
}

/// [`ChatPlatform`] backed by a live serenity context.
pub struct SerenityPlatform<'a> {
    ctx: &'a serenity::Context,
}

impl<'a> SerenityPlatform<'a> {
    pub fn new(ctx: &'a serenity::Context) -> Self {
        Self { ctx }
    }
}

fn truncate_for_discord(content: &str) -> &str {
    match content.char_indices().nth(DISCORD_MESSAGE_LIMIT) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform<'_> {
    fn bot(&self) -> BotIdentity {
        let user = self.ctx.cache.current_user();
        BotIdentity {
            id: user.id.get(),
            name: user.display_name().to_string(),
        }
    }

    fn member_display_name(&self, guild_id: Option<u64>, user_id: u64) -> Option<String> {
        let guild_id = guild_id.filter(|id| *id != 0)?;
        if user_id == 0 {
            return None;
        }
        let guild = self.ctx.cache.guild(serenity::GuildId::new(guild_id))?;
        guild
            .members
            .get(&serenity::UserId::new(user_id))
            .map(|member| member.display_name().to_string())
    }

    fn guild_emojis(&self, guild_id: Option<u64>) -> Vec<GuildEmoji> {
        let Some(guild_id) = guild_id.filter(|id| *id != 0) else {
            return Vec::new();
        };
        let Some(guild) = self.ctx.cache.guild(serenity::GuildId::new(guild_id)) else {
            return Vec::new();
        };
        guild
            .emojis
            .values()
            .map(|emoji| GuildEmoji {
                name: emoji.name.clone(),
                id: emoji.id.get(),
                animated: emoji.animated,
            })
            .collect()
    }

    fn set_activity(&self, status: &str) {
        self.ctx
            .set_activity(Some(serenity::ActivityData::playing(status)));
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), BotError> {
        let truncated = truncate_for_discord(content);
        if truncated.len() < content.len() {
            warn!("Reply truncated to {} characters", DISCORD_MESSAGE_LIMIT);
        }
        serenity::ChannelId::new(channel_id)
            .say(&self.ctx.http, truncated)
            .await?;
        Ok(())
    }

    async fn broadcast_typing(&self, channel_id: u64) {
        if let Err(e) = serenity::ChannelId::new(channel_id)
            .broadcast_typing(&self.ctx.http)
            .await
        {
            debug!("Failed to broadcast typing in {}: {}", channel_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude as serenity;
    use serenity::{ChannelId, GuildId, Message, MessageId, User, UserId};

    fn mock_message(content: &str) -> Message {
        let mut msg = Message::default();
        msg.id = MessageId::new(1);
        msg.channel_id = ChannelId::new(100);
        msg.guild_id = Some(GuildId::new(500));
        msg.author = User::default();
        msg.author.id = UserId::new(7);
        msg.content = content.to_string();
        msg
    }

    #[test]
    fn snapshot_copies_message_fields() {
        let mut msg = mock_message("hello <@9>");
        let mut mentioned = User::default();
        mentioned.id = UserId::new(9);
        msg.mentions = vec![mentioned];

        let incoming = IncomingMessage::from(&msg);
        assert_eq!(incoming.author_id, 7);
        assert!(!incoming.author_is_bot);
        assert_eq!(incoming.kind, MessageKind::Regular);
        assert_eq!(incoming.content, "hello <@9>");
        assert_eq!(incoming.channel_id, 100);
        assert_eq!(incoming.guild_id, Some(500));
        assert!(incoming.mentions_user(9));
        assert!(!incoming.mentions_user(7));
    }

    #[test]
    fn everyone_ping_mentions_every_user() {
        let mut msg = mock_message("@everyone hi");
        msg.mention_everyone = true;

        let incoming = IncomingMessage::from(&msg);
        assert!(incoming.mentions_everyone);
        assert!(incoming.mentions_user(7));
        assert!(incoming.mentions_user(1000));
    }

    #[test]
    fn non_default_types_are_other() {
        let mut msg = mock_message("joined");
        msg.kind = serenity::MessageType::MemberJoin;
        assert_eq!(IncomingMessage::from(&msg).kind, MessageKind::Other);
    }

    #[test]
    fn emoji_tokens_render() {
        let still = GuildEmoji { name: "pog".into(), id: 12, animated: false };
        let moving = GuildEmoji { name: "dance".into(), id: 34, animated: true };
        assert_eq!(still.token(), "<:pog:12>");
        assert_eq!(moving.token(), "<a:dance:34>");
    }

    #[test]
    fn long_messages_are_cut_at_the_limit() {
        let long = "é".repeat(DISCORD_MESSAGE_LIMIT + 10);
        assert_eq!(truncate_for_discord(&long).chars().count(), DISCORD_MESSAGE_LIMIT);
        assert_eq!(truncate_for_discord("short"), "short");
    }
}
