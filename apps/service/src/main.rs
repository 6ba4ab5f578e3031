//! svcwatch - periodic HTTP service monitor
//!
//! ```text
//! svcwatch add api https://api.example.org/health
//! svcwatch run
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod database;
mod pool;
mod trigger;

use config::Config;

#[derive(Parser)]
#[command(name = "svcwatch", about = "Watch HTTP services and escalate persistent failures", version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/svcwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan periodically until interrupted
    Run,
    /// Run a single scan cycle now
    Scan {
        /// Probe these addresses instead of the stored endpoints
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an endpoint
    Add {
        name: String,
        address: String,
    },
    /// Change an endpoint; its history is reset
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Remove an endpoint
    Remove {
        id: i64,
    },
    /// List endpoints and their health
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref())
        .context("Failed to load configuration")?
        .with_env_overrides();

    let format: logger::LogFormat = config.logging.format.parse().unwrap_or_default();
    logger::init_with(logger::parse_level(&config.logging.level), format)
        .context("Failed to initialize logging")?;

    match cli.command {
        Command::Run => commands::run(&config).await,
        Command::Scan { urls, json } => commands::scan(&config, urls, json).await,
        Command::Add { name, address } => commands::add(&config, name, address).await,
        Command::Edit { id, name, address } => commands::edit(&config, id, name, address).await,
        Command::Remove { id } => commands::remove(&config, id).await,
        Command::List { json } => commands::list(&config, json).await,
        Command::Config => {
            println!("{config}");
            Ok(())
        }
    }
}
