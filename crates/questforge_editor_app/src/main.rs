// SPDX-License-Identifier: MIT OR Apache-2.0
//! `QuestForge` Editor tooling
//!
//! Command line companion of the quest graph editor:
//! - Graph statistics per node type
//! - Load/save round-trip checks of graph documents
//! - Resolution of referenced design objects over HTTP
//! - Default configuration generation

mod commands;
mod config;
mod error;
mod loader;

use clap::{Parser, Subcommand};
use config::{AppConfig, CONFIG_FILE_NAME, DEFAULT_LOG_FILTER};
use error::AppError;
use loader::HttpObjectLoader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "questforge_editor", version, about = "QuestForge graph editor tooling")]
struct Cli {
    /// Configuration file (RON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count nodes per type
    Stats {
        /// Graph document (JSON)
        file: PathBuf,
    },
    /// Load and re-save a graph, reporting anything that would not survive
    Check {
        /// Graph document (JSON)
        file: PathBuf,
    },
    /// Fetch the display names of referenced objects
    Resolve {
        /// Graph document (JSON)
        file: PathBuf,
    },
    /// Write the default configuration
    InitConfig {
        /// Target file
        #[arg(default_value = CONFIG_FILE_NAME)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(log_filter: &str) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in log_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        match directive.parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive '{directive}': {e}"),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(command: Command, config: &AppConfig) -> Result<(), AppError> {
    match command {
        Command::Stats { file } => {
            let stats = commands::stats(config, &file).await?;
            commands::print_stats(&stats);
        }
        Command::Check { file } => {
            let report = commands::check(config, &file).await?;
            commands::print_check(&report);
        }
        Command::Resolve { file } => {
            let loader = Arc::new(HttpObjectLoader::new(config.remote.clone())?);
            let resolved = commands::resolve(config, loader, &file).await?;
            commands::print_resolved(&resolved);
        }
        Command::InitConfig { path, force } => commands::init_config(&path, force)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = AppConfig::load_or_default(cli.config.as_deref());
    init_tracing(loaded.as_ref().map_or(DEFAULT_LOG_FILTER, |c| c.log_filter.as_str()));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Cannot load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::debug!("Starting QuestForge editor tooling v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}
