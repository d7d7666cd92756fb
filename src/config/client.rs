//! Client configuration persistence
//!
//! Stored in ~/.config/karaq/config.json. Missing fields fall back to their
//! defaults, out-of-range values are clamped when loaded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::queue::cursor::MAX_ECHO_WINDOW;
use crate::queue::fetch::{MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};

const MIN_FILTER_DEBOUNCE_MS: u64 = 500;
const MAX_FILTER_DEBOUNCE_MS: u64 = 1000;

/// Tunables of the queue engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Config format version
    pub version: u32,
    /// Rows per fetched chunk
    pub chunk_size: usize,
    /// Quiet time after the last filter keystroke before refetching
    pub filter_debounce_ms: u64,
    /// Scroll reports this soon after a programmatic scroll are echoes
    pub echo_window_ms: u64,
    /// Start with the view following the playing entry
    pub follow_playing: bool,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Subscribe to the server push channel in the browser
    pub live_updates: bool,
    /// Preferred language for tag names (ISO 639-2, e.g. "eng")
    pub tag_language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            chunk_size: MAX_CHUNK_SIZE,
            filter_debounce_ms: MIN_FILTER_DEBOUNCE_MS,
            echo_window_ms: 500,
            follow_playing: true,
            request_timeout_secs: 15,
            live_updates: true,
            tag_language: "eng".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load the config from disk, defaults when absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            debug!("No client config found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read client config from {:?}", path))?;

        let config: Self =
            serde_json::from_str(&contents).with_context(|| "Failed to parse client config")?;

        debug!("Loaded client config from {:?}", path);
        Ok(config.normalized())
    }

    /// Save the config to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize client config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write client config to {:?}", path))?;

        debug!("Saved client config to {:?}", path);
        Ok(())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("karaq").join("config.json"))
    }

    /// Clamp every value into its supported range
    pub fn normalized(mut self) -> Self {
        self.chunk_size = self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        self.filter_debounce_ms = self
            .filter_debounce_ms
            .clamp(MIN_FILTER_DEBOUNCE_MS, MAX_FILTER_DEBOUNCE_MS);
        self.echo_window_ms = self.echo_window_ms.min(MAX_ECHO_WINDOW.as_millis() as u64);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }

    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"chunk_size": 200}"#).unwrap();
        assert_eq!(config.chunk_size, 200);
        assert_eq!(config.filter_debounce_ms, 500);
        assert!(config.follow_playing);
    }

    #[test]
    fn test_normalized_clamps_ranges() {
        let config = ClientConfig {
            chunk_size: 5000,
            filter_debounce_ms: 10,
            echo_window_ms: 4000,
            request_timeout_secs: 0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(config.chunk_size, MAX_CHUNK_SIZE);
        assert_eq!(config.filter_debounce_ms, 500);
        assert_eq!(config.echo_window(), MAX_ECHO_WINDOW);
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
