//! applab CLI - Main Entry Point
//!
//! Talks to the provisioning broker: lists backends, provisions pools of
//! appliances and tears them down again.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use applab_common::config::default_config_path;
use applab_common::HarnessConfig;
use commands::{backends, pool};

/// applab - appliance pools for UI test runs
#[derive(Parser)]
#[command(name = "applab")]
#[command(author, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "APPLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List backends the broker can provision from
    Backends,

    /// Provision a pool of appliances
    Provision(pool::ProvisionArgs),

    /// Destroy a pool
    Destroy {
        /// Pool ID
        pool_id: String,
    },

    /// Show the state of a provisioning request
    Status {
        /// Pool ID
        pool_id: String,
    },

    /// Extend the lease of a pool
    Prolong {
        /// Pool ID
        pool_id: String,

        /// Minutes to add
        #[arg(short, long, default_value = "60")]
        minutes: u32,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = HarnessConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    debug!("Loaded config from {}", config_path.display());

    match cli.command {
        Commands::Backends => backends::execute(&config, cli.format).await?,
        Commands::Provision(args) => pool::provision(args, &config, cli.format).await?,
        Commands::Destroy { pool_id } => pool::destroy(pool_id, &config).await?,
        Commands::Status { pool_id } => pool::status(pool_id, &config, cli.format).await?,
        Commands::Prolong { pool_id, minutes } => pool::prolong(pool_id, minutes, &config).await?,
        Commands::Version => {
            println!("applab v{}", applab_common::VERSION);
            println!("Broker: {}", config.broker.url);
        }
    }

    Ok(())
}
