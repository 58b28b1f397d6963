//! Interactive first-run configuration wizard
//!
//! Prompts with current values as defaults and persists the result. Secrets are
//! read with hidden input.

use anyhow::{Context, Result};
use dialoguer::{Input, Password};

use crate::config::{self, BridgeConfig};

/// Run the setup wizard and save the resulting config.
pub fn run(mut config: BridgeConfig) -> Result<BridgeConfig> {
    println!("=== openclaw-bridge setup ===\n");

    let cloud_url: String = Input::new()
        .with_prompt("Cloud WebSocket URL")
        .default(config.cloud_url.clone())
        .interact_text()
        .context("Failed to read cloud URL")?;
    if !cloud_url.starts_with("wss://") {
        println!("WARNING: Cloud URL should use wss:// for encrypted connections.");
    }
    config.cloud_url = cloud_url;

    let api_key = Password::new()
        .with_prompt("API Key (evo_...)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    if !api_key.is_empty() {
        if !api_key.starts_with("evo_") {
            println!("WARNING: API key does not start with 'evo_'. Please verify.");
        }
        config.api_key = api_key;
    }

    config.openclaw_url = Input::new()
        .with_prompt("OpenClaw URL")
        .default(config.openclaw_url.clone())
        .interact_text()
        .context("Failed to read OpenClaw URL")?;

    let token_display = if config.openclaw_token.is_empty() {
        "none"
    } else {
        "****"
    };
    config.openclaw_token = Password::new()
        .with_prompt(format!(
            "OpenClaw Token (empty for none) [current: {}]",
            token_display
        ))
        .allow_empty_password(true)
        .interact()
        .context("Failed to read OpenClaw token")?;

    config.openclaw_agent_id = Input::new()
        .with_prompt("OpenClaw Agent ID")
        .default(config.openclaw_agent_id.clone())
        .interact_text()
        .context("Failed to read agent ID")?;

    config.save()?;
    println!("\nConfig saved to {}", config::config_path().display());
    Ok(config)
}
