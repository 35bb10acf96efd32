/// Headless player configuration
use crate::error::{HeadlessError, Result};
use cadenza_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "cadenza.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HeadlessConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,

    #[serde(default)]
    pub access_token: Option<String>,
}

/// Simulated output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Seconds each simulated track plays before it ends
    #[serde(default = "default_track_secs")]
    pub track_secs: u64,
}

impl HeadlessConfig {
    /// Load configuration from file and environment
    ///
    /// `path` overrides the default `cadenza.toml`; an explicit path must
    /// exist. Environment variables use the `CADENZA_` prefix and `__`
    /// between nested keys, e.g. `CADENZA_SERVER__ACCESS_TOKEN`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(HeadlessError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENZA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = self.server.url.trim();
        if url.is_empty() {
            return Err(HeadlessError::Config(
                "Server URL is required (set CADENZA_SERVER__URL)".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(HeadlessError::Config(format!(
                "Server URL must start with http:// or https://, got {url}"
            )));
        }

        let playback = &self.playback;
        if playback.duck_volume > 100 || playback.initial_volume > 100 {
            return Err(HeadlessError::Config(
                "Volumes must be between 0 and 100".to_string(),
            ));
        }
        if playback.position_sample_interval_ms == 0 {
            return Err(HeadlessError::Config(
                "Position sample interval must be positive".to_string(),
            ));
        }
        if playback.cache.head_bytes > playback.cache.max_bytes {
            return Err(HeadlessError::Config(format!(
                "Cache head size ({}) exceeds cache capacity ({})",
                playback.cache.head_bytes, playback.cache.max_bytes
            )));
        }
        if self.output.track_secs == 0 {
            return Err(HeadlessError::Config(
                "Simulated track length must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy safe for printing
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.server.access_token.is_some() {
            copy.server.access_token = Some("***".to_string());
        }
        copy
    }
}

// Default values
fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_track_secs() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            access_token: None,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            track_secs: default_track_secs(),
        }
    }
}
