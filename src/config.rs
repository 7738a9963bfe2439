use crate::error::BotError;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_SETTINGS_PATH: &str = "pyborg.discord.toml";

#[derive(Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub pyborg: PyborgSettings,
    #[serde(default)]
    pub discord: DiscordSettings,
}

/// Connection details for the generation backend.
#[derive(Clone, Debug, Deserialize)]
pub struct PyborgSettings {
    #[serde(default = "default_true")]
    pub multiplex: bool,
    #[serde(default = "default_server")]
    pub multiplex_server: String,
    #[serde(default = "default_port")]
    pub multiplex_port: u16,
}

#[derive(Clone, Deserialize)]
pub struct DiscordSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_true")]
    pub learning: bool,
    #[serde(default)]
    pub plaintext_ping: bool,
}

fn default_true() -> bool {
    true
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    2001
}

impl Default for PyborgSettings {
    fn default() -> Self {
        Self {
            multiplex: true,
            multiplex_server: default_server(),
            multiplex_port: default_port(),
        }
    }
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            token: None,
            learning: true,
            plaintext_ping: false,
        }
    }
}

impl Settings {
    /// Load settings from the path given on the command line, `BORGCORD_SETTINGS`,
    /// or the default file name, in that order.
    pub fn from_env() -> Result<Self, BotError> {
        dotenv().ok();
        let path = env::args()
            .nth(1)
            .or_else(|| env::var("BORGCORD_SETTINGS").ok())
            .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
        Self::load(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BotError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, BotError> {
        let mut settings: Settings = toml::from_str(content)?;
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            if !token.is_empty() {
                settings.discord.token = Some(token);
            }
        }
        Ok(settings)
    }

    /// Base URL of the backend, always ending in a slash.
    pub fn backend_base_url(&self) -> String {
        format!(
            "http://{}:{}/",
            self.pyborg.multiplex_server, self.pyborg.multiplex_port
        )
    }

    pub fn require_multiplex(&self) -> Result<(), BotError> {
        if self.pyborg.multiplex {
            Ok(())
        } else {
            Err(BotError::UnsupportedMode)
        }
    }

    pub fn token(&self) -> Result<&str, BotError> {
        self.discord
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BotError::Configuration("discord.token must be set".to_string()))
    }
}

impl std::fmt::Debug for DiscordSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSettings")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("learning", &self.learning)
            .field("plaintext_ping", &self.plaintext_ping)
            .finish()
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("pyborg", &self.pyborg)
            .field("discord", &self.discord)
            .finish()
    }
}

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
