/// Headless player error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeadlessError>;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server client error: {0}")]
    Client(#[from] cadenza_server_client::ServerClientError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] cadenza_core::CoreError),

    #[error("Playback error: {0}")]
    Playback(#[from] cadenza_playback::PlaybackError),

    #[error("Collection is empty: {0}")]
    EmptyCollection(String),

    #[error("Controller task failed: {0}")]
    Task(String),
}

impl From<config::ConfigError> for HeadlessError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
