//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use tallybar_store::default_config_dir;
use tracing::info;

use crate::Cli;
use crate::app::{Output, credentials_path, load_settings, settings_path};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Change settings. Values are clamped into range. A running daemon
    /// picks the change up within a minute, or at once on `SIGHUP`.
    Set {
        /// Minutes between polls (1-60).
        #[arg(long)]
        poll_interval: Option<u32>,

        /// Alert threshold in percent (50-100).
        #[arg(long)]
        alert_threshold: Option<i32>,

        /// Enable or disable usage alerts.
        #[arg(long)]
        alert_enabled: Option<bool>,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Set {
            poll_interval,
            alert_threshold,
            alert_enabled,
        } => set_values(cli, *poll_interval, *alert_threshold, *alert_enabled).await,
        ConfigAction::Reset => reset_config(cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let store = load_settings(cli).await;
    let settings = store.get().await;
    let out = Output::new(cli);

    if out.is_json() {
        println!("{}", out.json.format(&settings)?);
    } else {
        println!("{}", out.text.format_settings(&settings, store.path()));
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings = settings_path(cli);
    let credentials = credentials_path(cli)?;
    let out = Output::new(cli);

    if out.is_json() {
        let paths = serde_json::json!({
            "configDir": config_dir.display().to_string(),
            "settingsFile": settings.display().to_string(),
            "credentialsFile": credentials.display().to_string(),
        });
        println!("{}", out.json.format(&paths)?);
    } else {
        println!("Configuration Paths");
        println!("{}", "─".repeat(40));
        println!();
        println!("Config dir:       {}", config_dir.display());
        println!("Settings file:    {}", settings.display());
        println!("Credentials file: {}", credentials.display());
    }

    Ok(())
}

async fn set_values(
    cli: &Cli,
    poll_interval: Option<u32>,
    alert_threshold: Option<i32>,
    alert_enabled: Option<bool>,
) -> Result<()> {
    if poll_interval.is_none() && alert_threshold.is_none() && alert_enabled.is_none() {
        anyhow::bail!("Nothing to set. Use --poll-interval, --alert-threshold or --alert-enabled");
    }

    let store = load_settings(cli).await;

    if let Some(minutes) = poll_interval {
        let applied = store.set_poll_interval_minutes(minutes).await?;
        if applied != minutes && !cli.quiet {
            println!("Poll interval clamped to {applied} min");
        }
    }
    if let Some(percent) = alert_threshold {
        let applied = store.set_alert_threshold_percent(percent).await?;
        if applied != percent && !cli.quiet {
            println!("Alert threshold clamped to {applied}%");
        }
    }
    if let Some(enabled) = alert_enabled {
        store.set_alert_enabled(enabled).await?;
    }

    info!(path = %store.path().display(), "Settings updated");
    show_config(cli).await
}

async fn reset_config(cli: &Cli) -> Result<()> {
    let path = settings_path(cli);

    if tokio::fs::try_exists(&path).await? {
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}
