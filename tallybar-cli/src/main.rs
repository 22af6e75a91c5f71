// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `TallyBar` CLI - Claude rate-limit usage from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show current usage (one poll)
//! tallybar
//!
//! # Run in the background, polling on the configured interval
//! tallybar daemon
//!
//! # Force an OAuth token refresh
//! tallybar refresh
//!
//! # JSON output
//! tallybar --format json --pretty
//!
//! # Change settings
//! tallybar config set --poll-interval 10 --alert-threshold 80
//! ```

mod app;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, daemon, refresh, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// `TallyBar` CLI - Claude usage monitoring.
#[derive(Parser)]
#[command(name = "tallybar")]
#[command(about = "Claude rate-limit usage monitor")]
#[command(long_about = r"
TallyBar reports how much of your Claude session (5-hour) and weekly
(7-day) rate limits you have used, using the OAuth login of the `claude`
CLI. It refreshes the token when needed and alerts once per session
window when usage crosses your threshold.

Examples:
  tallybar                       # One poll, print usage
  tallybar daemon                # Poll in the background
  tallybar refresh               # Force a token refresh
  tallybar config show           # Show settings
  tallybar --format json         # JSON output
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Credentials file (defaults to ~/.claude/.credentials.json).
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    /// Settings file (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Poll once and show usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// Poll on the configured interval until interrupted.
    #[command(visible_alias = "d")]
    Daemon(daemon::DaemonArgs),

    /// Refresh the OAuth access token now.
    #[command(visible_alias = "r")]
    Refresh(refresh::RefreshArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No usable login; run `claude` to log in.
    NotAuthenticated = 2,
    /// The usage request failed.
    RequestFailed = 3,
}

impl ExitCode {
    /// Exits the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self as i32)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("tallybar=debug,tallybar_core=debug,tallybar_fetch=debug,tallybar_providers=debug,tallybar_store=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Usage(args)) => usage::run(args, &cli).await,
        Some(Commands::Daemon(args)) => daemon::run(args, &cli).await,
        Some(Commands::Refresh(args)) => refresh::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
        None => usage::run(&usage::UsageArgs::default(), &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        ExitCode::Error.exit();
    }

    Ok(())
}
