//! Per-message handling: filtering, `!command` execution, learning and replies.

use crate::backend::Backend;
use crate::commands::CommandRegistry;
use crate::config::Settings;
use crate::error::BotError;
use crate::normalize::{clean_message, fix_nickname_mentions};
use crate::platform::{BotIdentity, ChatPlatform, GuildEmoji, IncomingMessage, MessageKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info};

pub const SAVING_STATUS: &str = "Saving brain...";
pub const IDLE_STATUS: &str = "hack the planet";
pub const FALLBACK_REPLY: &str = "I don't know anything about that yet :(";

/// Status is polled on every Nth non-command message.
const STATUS_POLL_INTERVAL: usize = 5;
/// Chance that a reply word matching a guild emoji is swapped for the emoji.
const EMOJI_CHANCE: f64 = 0.05;

/// What happened to a single inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Filtered out before any processing.
    Ignored,
    Command,
    UnknownCommand,
    Learned,
    Replied,
    /// Nothing to learn and nothing to answer.
    Idle,
}

/// Mutable state carried across events.
#[derive(Debug, Default)]
pub struct DispatchState {
    save_status_count: AtomicUsize,
}

impl DispatchState {
    /// Count a non-command message, returning whether status should be polled for it.
    fn tick(&self) -> bool {
        self.save_status_count.fetch_add(1, Ordering::SeqCst) % STATUS_POLL_INTERVAL == 0
    }
}

type Roll = Box<dyn Fn() -> f64 + Send + Sync>;

pub struct MessageDispatcher<B> {
    backend: B,
    registry: CommandRegistry,
    learning: bool,
    plaintext_ping: bool,
    state: DispatchState,
    roll: Roll,
}

impl<B: Backend> MessageDispatcher<B> {
    pub fn new(settings: &Settings, backend: B, registry: CommandRegistry) -> Self {
        Self {
            backend,
            registry,
            learning: settings.discord.learning,
            plaintext_ping: settings.discord.plaintext_ping,
            state: DispatchState::default(),
            roll: Box::new(rand::random::<f64>),
        }
    }

    /// Replace the uniform `[0, 1)` source used for emoji substitution.
    pub fn with_roll(mut self, roll: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.roll = Box::new(roll);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn dispatch<P: ChatPlatform>(
        &self,
        platform: &P,
        message: &IncomingMessage,
    ) -> Result<DispatchOutcome, BotError> {
        let bot = platform.bot();

        if message.kind != MessageKind::Regular
            || message.author_is_bot
            || message.author_id == bot.id
            || message.content.is_empty()
        {
            return Ok(DispatchOutcome::Ignored);
        }

        if message.content.starts_with('!') {
            return self.run_command(platform, message).await;
        }

        info!("raw message: {}", message.content);

        if self.state.tick() {
            if let Err(e) = self.refresh_status(platform).await {
                error!("Failed to poll backend status: {}", e);
            }
        }

        let was_mentioned = message.mentions_user(bot.id)
            || (self.plaintext_ping && self.plaintext_mentioned(platform, message, &bot));

        let members = |user_id: u64| platform.member_display_name(message.guild_id, user_id);

        if !was_mentioned {
            if !self.learning {
                return Ok(DispatchOutcome::Idle);
            }
            let text = clean_message(&message.content, &members);
            info!("learning: {}", text);
            self.backend.submit_learning(&text).await?;
            return Ok(DispatchOutcome::Learned);
        }

        let content = fix_nickname_mentions(&message.content);
        let prompt = strip_leading_mention(&content, &bot);
        if prompt.is_empty() {
            return Ok(DispatchOutcome::Idle);
        }

        let text = clean_message(&prompt, &members);
        info!("input message: {}", text);

        platform.broadcast_typing(message.channel_id).await;
        let reply = self.backend.request_reply(&text).await?;
        info!("replying with: {}", reply);

        let outgoing = if reply.is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            let emojis = platform.guild_emojis(message.guild_id);
            neutralize_mass_mentions(&sprinkle_emojis(&reply, &emojis, &*self.roll))
        };
        platform.send_message(message.channel_id, &outgoing).await?;
        Ok(DispatchOutcome::Replied)
    }

    async fn run_command<P: ChatPlatform>(
        &self,
        platform: &P,
        message: &IncomingMessage,
    ) -> Result<DispatchOutcome, BotError> {
        let name = message
            .content
            .split_whitespace()
            .next()
            .map(|token| &token[1..])
            .unwrap_or_default();

        if name == "list" || name == "help" {
            let mut help_text = String::from("I have a bunch of commands:");
            for command in self.registry.list_names() {
                help_text.push_str(" !");
                help_text.push_str(command);
            }
            platform.send_message(message.channel_id, &help_text).await?;
            return Ok(DispatchOutcome::Command);
        }

        let Some(command) = self.registry.resolve(name) else {
            debug!("cmd: ignoring unknown command {:?}", name);
            return Ok(DispatchOutcome::UnknownCommand);
        };
        debug!("cmd: Running command {} ({:?})", name, command);
        let output = command.invoke(&message.content).await?;
        platform.send_message(message.channel_id, &output).await?;
        Ok(DispatchOutcome::Command)
    }

    async fn refresh_status<P: ChatPlatform>(&self, platform: &P) -> Result<(), BotError> {
        let status = self.backend.poll_status().await?;
        platform.set_activity(if status.busy { SAVING_STATUS } else { IDLE_STATUS });
        Ok(())
    }

    fn plaintext_mentioned<P: ChatPlatform>(
        &self,
        platform: &P,
        message: &IncomingMessage,
        bot: &BotIdentity,
    ) -> bool {
        let name = platform
            .member_display_name(message.guild_id, bot.id)
            .unwrap_or_else(|| bot.name.clone());
        !name.is_empty()
            && message
                .content
                .to_lowercase()
                .contains(&name.to_lowercase())
    }
}

/// Drop the bot's own mention, or its name typed out, from the front of `content`.
fn strip_leading_mention(content: &str, bot: &BotIdentity) -> String {
    let mut words = content.split_whitespace();
    if words.next() == Some(bot.mention().as_str()) {
        return words.collect::<Vec<_>>().join(" ");
    }

    let name_len = bot.name.chars().count();
    let head: String = content.chars().take(name_len).collect();
    if !bot.name.is_empty() && head.to_lowercase() == bot.name.to_lowercase() {
        // Skip the name and the separator after it.
        return content.chars().skip(name_len + 1).collect();
    }

    content.to_string()
}

/// Occasionally swap words that name a guild emoji for the emoji itself.
fn sprinkle_emojis(reply: &str, emojis: &[GuildEmoji], roll: &dyn Fn() -> f64) -> String {
    if emojis.is_empty() {
        return reply.to_string();
    }
    let by_name: HashMap<&str, &GuildEmoji> =
        emojis.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut out = String::with_capacity(reply.len());
    let mut word_start: Option<usize> = None;
    let push_word = |out: &mut String, word: &str| match by_name.get(word) {
        Some(emoji) if roll() <= EMOJI_CHANCE => out.push_str(&emoji.token()),
        _ => out.push_str(word),
    };

    for (idx, c) in reply.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = word_start.take() {
                push_word(&mut out, &reply[start..idx]);
            }
            out.push(c);
        } else if word_start.is_none() {
            word_start = Some(idx);
        }
    }
    if let Some(start) = word_start {
        push_word(&mut out, &reply[start..]);
    }
    out
}

/// Wrap `@everyone` and `@here` in code spans so they cannot ping.
fn neutralize_mass_mentions(reply: &str) -> String {
    reply
        .replace("@everyone", "`@everyone`")
        .replace("@here", "`@here`")
}
