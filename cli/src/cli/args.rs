//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::AcquireStrategy;

/// Remote media-key client.
///
/// Signs in through the browser, then listens on a live channel for key
/// commands sent from the web app and presses them locally.
#[derive(Parser, Debug)]
#[command(name = "mediactl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in through the browser.
    ///
    /// Opens the service's login page and waits for the credential to be
    /// handed back to this machine.
    Login {
        /// How the credential is collected.
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Print the login URL instead of opening the browser.
        #[arg(long)]
        no_browser: bool,
    },

    /// Log out and remove the stored credential.
    Logout,

    /// Show current login status.
    Status {
        /// Read the stored credential without contacting the service.
        #[arg(long)]
        offline: bool,
    },

    /// Connect and handle remote key commands until interrupted.
    ///
    /// Uses the stored credential when there is one, otherwise logs in first.
    Run {
        /// Reconnect attempts after the connection fails or drops.
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Seconds to wait between reconnect attempts.
        #[arg(long, default_value_t = 5, value_name = "SECS")]
        retry_delay: u64,
    },

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    /// Follow shell-specific instructions to install.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },
}

/// Supported shell types for completions.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
}

/// Acquisition strategy argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Long-poll the service for the credential.
    Poll,
    /// Receive the browser redirect on a local port.
    Callback,
}

impl From<StrategyArg> for AcquireStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Poll => Self::Poll,
            StrategyArg::Callback => Self::Callback,
        }
    }
}
