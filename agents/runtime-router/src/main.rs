//! Runtime Router Entry Point
//!
//! This is the main entry point for the runtime-router daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use runtime_router::cli::config::{Config, LoggingConfig};
use runtime_router::hub::RuntimeHub;
use runtime_router::runtime::docker::adapter::DockerConnector;

#[derive(Parser)]
#[command(name = "runtime-router")]
#[command(author, version, about = "Runtime Router - Per-workload routing across container runtime endpoints")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/runtime-router/config.toml", env = "RUNTIME_ROUTER_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the registry and keep it fresh until interrupted
    Start,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let config = Config::load_or_default(&cli.config)?;
            init_logging(&config.logging, cli.verbose)?;
            run(&config).await?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let result = if logging.format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn run(config: &Config) -> Result<()> {
    info!("Starting Runtime Router...");
    info!(
        "Endpoints are dialed over the Docker Engine API; CRI-only sockets \
         (CRI-O, containerd) report as unavailable"
    );

    let hub = RuntimeHub::from_config(config, Arc::new(DockerConnector::new())).await;

    for address in hub.registry().addresses() {
        info!(address = %address, "Endpoint registered");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    hub.shutdown()
        .await
        .context("Failed to persist registry state on shutdown")?;
    Ok(())
}

fn show_version() {
    println!("runtime-router {}", env!("CARGO_PKG_VERSION"));
    println!("Per-workload routing across container runtime endpoints");
    println!();
    println!("Features:");
    println!("  - Cached runtime/image connections per endpoint");
    println!("  - Time-based freshness with background refresh");
    println!("  - Label-driven runtime override per workload");
    println!("  - Registry state persisted across restarts");
}
