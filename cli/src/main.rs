//! mediactl - remote media-key client
//!
//! Signs in through the browser, keeps the credential on disk and listens on
//! a live channel for key commands sent from the web app.

mod auth;
mod cli;
mod client;
mod config;
mod error;
mod keys;
mod manager;
mod session;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{commands, Cli, Commands};
use crate::config::{load_config, load_config_from, AppConfig};
use crate::error::Result;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(config::settings::env::LOG_LEVEL)
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Run the command
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login {
            strategy,
            no_browser,
        } => {
            let mut config = load(&cli)?;
            if let Some(strategy) = strategy {
                config.auth.strategy = strategy.into();
            }
            commands::handle_login(config, no_browser).await
        },
        Commands::Logout => commands::handle_logout(load(&cli)?),
        Commands::Status { offline } => commands::handle_status(load(&cli)?, offline).await,
        Commands::Run {
            retries,
            retry_delay,
        } => {
            commands::handle_run(load(&cli)?, retries, Duration::from_secs(retry_delay)).await
        },
        Commands::Completions { shell } => commands::handle_completions(shell),
    }
}
