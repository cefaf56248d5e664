//! Client configuration.
//!
//! Loaded from an optional JSON file; `SCOREBOARD_URL` in the environment
//! overrides the authority URL.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`ClientConfig::url`].
pub const URL_ENV: &str = "SCOREBOARD_URL";

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the scoreboard.
    pub url: String,

    /// Delay between reconnect attempts.
    pub reconnect_delay_ms: u64,

    /// Give up after this many consecutive failed attempts. Unlimited when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,

    /// Keep-alive period.
    pub ping_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/WS/".to_string(),
            reconnect_delay_ms: 2000,
            max_reconnect_attempts: None,
            ping_interval_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(URL_ENV) {
            if !url.is_empty() {
                self.url = url;
            }
        }
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }
}
