use super::{Command, CommandInput, CommandRegistry, FnCommand, Internals};
use crate::config::Settings;
use crate::error::BotError;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Registry holding every built-in command.
pub fn registry(settings: &Settings, http: reqwest::Client) -> CommandRegistry {
    let mut registry = CommandRegistry::new(Internals {
        multiplexing: settings.pyborg.multiplex,
        backend_url: settings.backend_base_url(),
    });
    registry.register("info", Arc::new(FnCommand::new(info)), false, false);
    registry.register("words", Arc::new(Words { http }), true, false);
    registry.register("choose", Arc::new(FnCommand::new(choose)), false, true);
    info!("Loaded {}", registry);
    registry
}

fn info(_input: CommandInput<'_>) -> Result<String, BotError> {
    Ok(format!(
        "I am borgcord v{}, a discord front end for a pyborg brain. Try !help for commands.",
        env!("CARGO_PKG_VERSION")
    ))
}

/// Pick one of the `or`-separated options after the command name.
fn choose(input: CommandInput<'_>) -> Result<String, BotError> {
    let text = input.message.unwrap_or_default();
    let rest = text
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default();

    let options: Vec<&str> = rest
        .split(" or ")
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .collect();

    match options.choose(&mut rand::thread_rng()) {
        Some(choice) => Ok((*choice).to_string()),
        None => Ok("Usage: !choose this or that".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct WordStats {
    words: u64,
    contexts: u64,
    #[serde(default)]
    lines: u64,
}

impl WordStats {
    fn describe(&self) -> String {
        let per_word = if self.words == 0 {
            0.0
        } else {
            self.contexts as f64 / self.words as f64
        };
        format!(
            "I know {} words ({} contexts, {:.2} per word), {} lines.",
            self.words, self.contexts, per_word, self.lines
        )
    }
}

/// Reports the size of the backend's vocabulary.
struct Words {
    http: reqwest::Client,
}

#[async_trait]
impl Command for Words {
    async fn run(&self, input: CommandInput<'_>) -> Result<String, BotError> {
        let internals = input
            .internals
            .ok_or_else(|| BotError::Command("words needs backend details".to_string()))?;
        if !internals.multiplexing {
            return Err(BotError::UnsupportedMode);
        }

        let stats = self
            .http
            .get(format!("{}words.json", internals.backend_url))
            .send()
            .await?
            .error_for_status()?
            .json::<WordStats>()
            .await?;
        Ok(stats.describe())
    }
}
