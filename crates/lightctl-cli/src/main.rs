//! lightctl - Command-line interface for LightControl LED controllers
//!
//! Find nodes on the local network, show what a node reports and set a
//! static color.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lightctl_client::{ClientBuilder, LightControlClient};
use lightctl_core::{light_mode, LightMode, OnBoardLedStrength};
use lightctl_discovery::LightControlDiscover;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::FileConfig;

/// Time allowed for a queued command to reach the node before exiting
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// lightctl - LightControl command line client
#[derive(Parser)]
#[command(name = "lightctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "LIGHTCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse for LightControl nodes and print what was found
    Discover {
        /// Seconds to listen for announcements
        #[arg(short, long, default_value = "5")]
        wait: u64,
    },

    /// Connect to a node and print its status and node list
    Status {
        /// Node hostname or address
        #[arg(short = 'H', long, env = "LIGHTCTL_HOST")]
        host: Option<String>,

        /// WebSocket port
        #[arg(short, long, env = "LIGHTCTL_PORT")]
        port: Option<u16>,

        /// Seconds to wait for the connection and node list
        #[arg(short, long, default_value = "3")]
        wait: u64,
    },

    /// Switch the lights on with a static color
    Color {
        /// Node hostname or address
        #[arg(short = 'H', long, env = "LIGHTCTL_HOST")]
        host: Option<String>,

        /// WebSocket port
        #[arg(short, long, env = "LIGHTCTL_PORT")]
        port: Option<u16>,

        r: u8,
        g: u8,
        b: u8,

        /// Brightness between 0.0 and 1.0
        #[arg(short, long, default_value = "1.0")]
        strength: f32,
    },

    /// Turn the on-board debug LED off
    ResetLed {
        /// Node hostname or address
        #[arg(short = 'H', long, env = "LIGHTCTL_HOST")]
        host: Option<String>,

        /// WebSocket port
        #[arg(short, long, env = "LIGHTCTL_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    let file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Discover { wait } => {
            run_discover(&file, Duration::from_secs(wait)).await?;
        }

        Commands::Status { host, port, wait } => {
            let client = connect(&file, host, port)?;
            run_status(&client, Duration::from_secs(wait)).await;
        }

        Commands::Color {
            host,
            port,
            r,
            g,
            b,
            strength,
        } => {
            if !(0.0..=1.0).contains(&strength) {
                anyhow::bail!("Strength must be between 0.0 and 1.0, got {}", strength);
            }
            let message = LightMode {
                mode: light_mode::ON,
                strength,
                r,
                g,
                b,
            };
            let client = connect(&file, host, port)?;
            println!(
                "{} Setting color {} on {}",
                "LightControl".cyan().bold(),
                format!("#{:02x}{:02x}{:02x}", r, g, b).yellow(),
                client.config().hostname
            );
            send_and_flush(&client, &message).await?;
        }

        Commands::ResetLed { host, port } => {
            let client = connect(&file, host, port)?;
            println!(
                "{} Resetting on-board LED on {}",
                "LightControl".cyan().bold(),
                client.config().hostname
            );
            send_and_flush(&client, &OnBoardLedStrength { strength: 0.0 }).await?;
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

fn connect(file: &FileConfig, host: Option<String>, port: Option<u16>) -> Result<LightControlClient> {
    let config = file.client.to_config(host, port)?;
    let client = ClientBuilder::from_config(config).build();
    client.start().context("Failed to start client")?;
    Ok(client)
}

/// Poll `condition` until it holds, `limit` passes or Ctrl+C is pressed
async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    tokio::select! {
        result = tokio::time::timeout(limit, poll) => result.is_ok(),
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
    }
}

async fn run_discover(file: &FileConfig, wait: Duration) -> Result<()> {
    println!(
        "{} Browsing for {} for {}s",
        "LightControl".cyan().bold(),
        file.discovery.to_config().service_type.yellow(),
        wait.as_secs()
    );

    let discover = LightControlDiscover::with_config(file.discovery.to_config())
        .context("Failed to start discovery")?;
    wait_until(wait, || !discover.is_active()).await;

    if !discover.is_active() {
        warn!("Discovery is not running, the table stays empty");
    }

    let devices = discover.devices();
    if devices.is_empty() {
        println!("No devices found");
    }
    for device in devices {
        println!("  {:<32} {}", device.name.green(), device.address);
    }
    Ok(())
}

async fn run_status(client: &LightControlClient, wait: Duration) {
    if wait_until(wait, || client.is_connected()).await {
        // The node announces its mesh right after the handshake
        wait_until(wait, || !client.device_state().nodes.is_empty()).await;
    }

    println!("{} {}", "LightControl".cyan().bold(), client.connection_string());

    let state = client.device_state();
    for node in &state.nodes {
        println!(
            "  {} {:<20} layer {} parent {} board {} light type {}{}",
            node.mac.to_string().yellow(),
            node.name.green(),
            node.layer,
            node.parent_mac,
            node.board_type,
            node.light_type,
            if node.is_global_mode { " (global)" } else { "" }
        );
    }
    if let Some(mode) = &state.light_mode {
        println!(
            "  light mode {} strength {:.2} rgb({}, {}, {})",
            mode.mode, mode.strength, mode.r, mode.g, mode.b
        );
    }
}

async fn send_and_flush<M: lightctl_core::Compose>(client: &LightControlClient, message: &M) -> Result<()> {
    let connect_limit = client.config().websocket.connect_timeout
        + client.config().websocket.handshake_timeout;
    if !wait_until(connect_limit, || client.is_connected()).await {
        anyhow::bail!("Could not connect: {}", client.connection_string());
    }

    client.send_message(message)?;
    if !wait_until(FLUSH_TIMEOUT, || !client.is_sending()).await {
        anyhow::bail!("Message not delivered within {:?}", FLUSH_TIMEOUT);
    }
    println!("{} Sent", "LightControl".cyan().bold());
    Ok(())
}
