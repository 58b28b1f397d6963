//! Configuration loading and persistence
//!
//! Config lives at `<config_dir>/openclaw-bridge/config.toml` (for example
//! `~/.config/openclaw-bridge/config.toml` on Linux). Missing keys fall back to
//! defaults; unknown keys are ignored.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Bridge daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Cloud WebSocket endpoint
    #[serde(default = "default_cloud_url")]
    pub cloud_url: String,

    /// API key for the cloud (issued as `evo_...`)
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the local OpenClaw agent
    #[serde(default = "default_openclaw_url")]
    pub openclaw_url: String,

    /// Optional bearer token for the OpenClaw API
    #[serde(default)]
    pub openclaw_token: String,

    /// OpenClaw agent id (selects the model `openclaw:<id>`)
    #[serde(default = "default_agent_id")]
    pub openclaw_agent_id: String,

    /// Start OpenClaw automatically when it is not already running
    #[serde(default = "default_auto_start")]
    pub openclaw_auto_start: bool,

    /// Cap on the reconnect backoff interval, in seconds
    #[serde(default = "default_reconnect_max")]
    pub reconnect_interval_max: u64,

    /// Timeout for a single tool query against OpenClaw, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_cloud_url() -> String {
    "wss://stackme.cloud/ws/bridge".to_string()
}

fn default_openclaw_url() -> String {
    "http://localhost:18789".to_string()
}

fn default_agent_id() -> String {
    "main".to_string()
}

fn default_auto_start() -> bool {
    true
}

fn default_reconnect_max() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cloud_url: default_cloud_url(),
            api_key: String::new(),
            openclaw_url: default_openclaw_url(),
            openclaw_token: String::new(),
            openclaw_agent_id: default_agent_id(),
            openclaw_auto_start: default_auto_start(),
            reconnect_interval_max: default_reconnect_max(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Directory holding the bridge configuration
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("openclaw-bridge")
}

/// Path of the config file
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl BridgeConfig {
    /// Load config from disk, falling back to defaults when the file is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// Persist config to disk with owner-only permissions.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }

        let path = config_path();
        let raw = toml::to_string_pretty(self).context("Failed to encode config")?;
        std::fs::write(&path, raw)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}
