use thiserror::Error;

/// Failures that can surface while configuring the bot or handling a message.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// In-process generation is not available; a multiplexing backend is required.
    #[error("running without a multiplexing backend is not supported")]
    UnsupportedMode,

    #[error("backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("backend client has been closed")]
    BackendClosed,

    #[error("discord error: {0}")]
    Platform(#[from] serenity::Error),

    #[error("failed to read settings file: {0}")]
    SettingsIo(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("command failed: {0}")]
    Command(String),
}
