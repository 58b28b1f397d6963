use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openclaw_bridge::config::{self, BridgeConfig};
use openclaw_bridge::launcher::OpenClawLauncher;
use openclaw_bridge::openclaw::{Gateway, OpenClawClient};
use openclaw_bridge::relay::RelayClient;
use openclaw_bridge::wizard;

#[derive(Parser)]
#[command(name = "openclaw-bridge")]
#[command(about = "Bridge daemon connecting a local OpenClaw agent to the cloud")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-run the configuration wizard
    Config {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
    /// Check whether the local OpenClaw agent is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { force }) => run_config(force),
        Some(Commands::Health) => run_health().await,
        None => run_bridge().await,
    }
}

/// Handle the `config` command
fn run_config(force: bool) -> Result<()> {
    let config = BridgeConfig::load()?;
    if !force && !config.api_key.is_empty() {
        println!("Config already exists at {}", config::config_path().display());
        println!("Use 'openclaw-bridge config --force' to overwrite.");
        return Ok(());
    }
    wizard::run(config)?;
    Ok(())
}

/// Handle the `health` command: one-shot probe of the local agent
async fn run_health() -> Result<()> {
    let config = BridgeConfig::load()?;
    let gateway = OpenClawClient::from_config(&config);
    if gateway.health_check().await {
        println!("OpenClaw is reachable at {}", config.openclaw_url);
        Ok(())
    } else {
        println!("OpenClaw is NOT reachable at {}", config.openclaw_url);
        std::process::exit(1);
    }
}

/// Default command: first-run wizard if needed, ensure OpenClaw, then relay.
async fn run_bridge() -> Result<()> {
    let mut config = BridgeConfig::load()?;

    // A missing API key means the wizard has never completed
    if config.api_key.is_empty() {
        println!("No configuration found. Starting setup wizard...\n");
        config = wizard::run(config)?;
        if config.api_key.is_empty() {
            eprintln!("API key is required. Aborting.");
            std::process::exit(1);
        }
        println!();
    }

    let mut launcher = None;
    if config.openclaw_auto_start {
        let mut managed = OpenClawLauncher::new(&config.openclaw_url);
        if !managed.ensure_running().await {
            if OpenClawLauncher::find_executable().is_none() {
                eprintln!("OpenClaw is not installed.");
                eprintln!("Install it from: https://github.com/anthropics/openclaw");
                eprintln!("Or disable auto-start: set openclaw_auto_start to false in config.");
            } else {
                eprintln!(
                    "Failed to start OpenClaw. Check {} for details.",
                    managed.stderr_log().display()
                );
            }
            std::process::exit(1);
        }
        launcher = Some(managed);
    } else {
        // Auto-start disabled: just report connectivity once
        let gateway = OpenClawClient::from_config(&config);
        if !gateway.health_check().await {
            tracing::warn!(
                "OpenClaw not reachable at {}; bridge will keep retrying after connecting to cloud",
                config.openclaw_url
            );
        }
    }

    println!("Starting openclaw-bridge daemon...");
    println!("  Cloud:    {}", config.cloud_url);
    println!("  OpenClaw: {}", config.openclaw_url);
    println!("  Config:   {}", config::config_path().display());
    println!();

    let mut client = RelayClient::from_config(&config);
    tokio::select! {
        _ = client.run() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    // Reached on either branch; a gateway this daemon did not start is left alone
    if let Some(mut managed) = launcher {
        managed.terminate().await;
    }
    Ok(())
}
