//! Usage command - poll once and display usage.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tallybar_core::PollError;
use tallybar_providers::PollOutcome;
use tracing::info;

use crate::app::{App, Output};
use crate::{Cli, ExitCode};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Also evaluate the usage alert and record it in the settings file.
    #[arg(long)]
    pub alert: bool,
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli) -> Result<()> {
    let app = App::build(cli).await?;
    let out = Output::new(cli);

    info!("Fetching usage");
    match app.poller.trigger().await {
        PollOutcome::Updated(snapshot) => {
            if out.is_json() {
                println!("{}", out.json.format_usage(&snapshot)?);
            } else if !cli.quiet {
                println!("{}", out.text.format_usage(&snapshot, Utc::now()));
            } else {
                println!("{}", snapshot.tooltip());
            }

            if args.alert {
                if let Some(alert) = app.alerts.evaluate(Some(&snapshot)).await {
                    if out.is_json() {
                        println!("{}", out.json.format_alert(&alert)?);
                    } else {
                        println!("{}", out.text.format_alert(&alert));
                    }
                }
            }
            Ok(())
        }
        PollOutcome::Failed(error) => {
            if out.is_json() {
                println!("{}", out.json.format_error(&error)?);
            } else if !cli.quiet {
                eprintln!("{}", out.text.format_error(&error));
            }
            exit_for(&error).exit()
        }
        PollOutcome::Skipped => Ok(()),
    }
}

/// Maps a poll failure to the process exit code.
pub fn exit_for(error: &PollError) -> ExitCode {
    if error.needs_login() {
        ExitCode::NotAuthenticated
    } else {
        ExitCode::RequestFailed
    }
}
