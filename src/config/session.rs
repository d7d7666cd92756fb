//! Per-side client state carried between browser runs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::queue::playlist::PlaylistId;

/// What one side was showing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideState {
    pub playlist: Option<PlaylistId>,
    #[serde(default)]
    pub filter: String,
}

/// Last playlist and filter text of both sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub left: SideState,
    pub right: SideState,
}

impl SessionState {
    /// Get the session file path
    pub fn session_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?;
        Ok(cache_dir.join("karaq").join("session.json"))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::session_path()?)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::session_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize session state")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write session state to {:?}", path))?;

        debug!("Saved session state to {:?}", path);
        Ok(())
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session state from {:?}", path))?;
        let state: Self =
            serde_json::from_str(&content).context("Failed to parse session state")?;

        debug!("Loaded session state from {:?}", path);
        Ok(state)
    }
}
