//! Storlink - Tracker Connectivity Checker
//!
//! Dials each configured tracker endpoint and reports whether a usable
//! connection can be established.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storlink::{config::ConfigManager, ConnectionSettings, TrackerConnection, TrackerEndpoint};

/// CLI arguments for storlink
#[derive(Parser, Debug)]
#[command(name = "storlink")]
#[command(about = "Storlink - Tracker connectivity checker")]
#[command(version)]
#[command(long_about = "
Storlink - Tracker connectivity checker

Dials each configured tracker endpoint and reports connect latency and
availability.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  STORLINK_TRACKERS         - Comma-separated tracker endpoints (host:port)
  STORLINK_CONNECT_TIMEOUT  - Connect timeout (e.g., 5s, 500ms)
  STORLINK_POOL_ENABLED     - Acquire transports through the pool (true/false)
  STORLINK_POOL_MAX_IDLE    - Idle transports retained per endpoint
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "storlink.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Tracker endpoints to check (overrides config file)
    #[arg(short, long, help = "Tracker endpoint (host:port), repeatable")]
    pub tracker: Vec<String>,

    /// Connect timeout (overrides config file)
    #[arg(long, help = "Connect timeout (e.g., 5s, 500ms)")]
    pub timeout: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_tracing(&args)?;

    info!("Starting storlink v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        info!("Config file not found, checking environment variables");
        ConfigManager::load_from_env()?
    };

    if !args.tracker.is_empty() {
        config.tracker.endpoints = args
            .tracker
            .iter()
            .map(|s| s.parse::<TrackerEndpoint>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid --tracker argument")?;
    }

    if let Some(timeout) = args.timeout.as_deref() {
        config.tracker.connect_timeout = humantime::parse_duration(timeout)
            .with_context(|| format!("Invalid --timeout: {}", timeout))?;
    }

    config.validate()?;

    if config.tracker.endpoints.is_empty() {
        bail!("No tracker endpoints configured; pass --tracker or set STORLINK_TRACKERS");
    }

    let settings = ConnectionSettings::from_config(&config);

    let mut failures = 0;
    for endpoint in &config.tracker.endpoints {
        match check_endpoint(endpoint.clone(), settings.clone()).await {
            Ok(latency) => {
                info!(
                    "Tracker {} reachable in {:?}",
                    endpoint,
                    latency
                );
            }
            Err(e) => {
                error!("Tracker {} unreachable: {}", endpoint, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} tracker endpoint(s) unreachable", failures);
    }

    info!("All {} tracker endpoint(s) reachable", config.tracker.endpoints.len());
    Ok(())
}

/// Connect to one endpoint and verify the transport is usable
async fn check_endpoint(
    endpoint: TrackerEndpoint,
    settings: ConnectionSettings,
) -> Result<std::time::Duration> {
    let start = Instant::now();
    let mut conn = TrackerConnection::connect(endpoint.clone(), settings).await?;
    let latency = start.elapsed();

    if !conn.is_available() {
        conn.close().await?;
        bail!("connection to {} established but not available", endpoint);
    }

    conn.close().await?;
    Ok(latency)
}

/// Initialize the tracing subscriber from CLI arguments
fn init_tracing(args: &CliArgs) -> Result<()> {
    let level = if args.verbose {
        "debug"
    } else {
        args.log_level.as_str()
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("storlink={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
