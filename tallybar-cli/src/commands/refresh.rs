//! Refresh command - exchange the refresh token for a new access token.

use anyhow::Result;
use clap::Args;
use tallybar_providers::TokenRefresher;
use tracing::info;

use crate::app::{App, Output};
use crate::{Cli, ExitCode};

/// Arguments for the refresh command.
#[derive(Args)]
pub struct RefreshArgs {
    /// Only refresh when the token is within five minutes of expiry.
    #[arg(long)]
    pub if_expired: bool,
}

/// Runs the refresh command.
pub async fn run(args: &RefreshArgs, cli: &Cli) -> Result<()> {
    let app = App::build(cli).await?;
    let out = Output::new(cli);

    let Some(current) = app.credentials.get(true).await else {
        report(&out, cli, false, "No credential found. Run `claude` to log in.", None)?;
        ExitCode::NotAuthenticated.exit();
    };

    if args.if_expired && !TokenRefresher::is_expired(&current) {
        info!(expires_at = %current.expires_at, "Token still valid, not refreshing");
        return report(
            &out,
            cli,
            false,
            "Token still valid",
            Some(current.expires_at.to_rfc3339()),
        );
    }

    if !app.refresher.refresh().await {
        report(
            &out,
            cli,
            false,
            "Token refresh failed. Run `claude` to log in again.",
            None,
        )?;
        ExitCode::NotAuthenticated.exit();
    }

    let expires_at = app
        .credentials
        .get(true)
        .await
        .map(|c| c.expires_at.to_rfc3339());
    report(&out, cli, true, "Token refreshed", expires_at)
}

fn report(
    out: &Output,
    cli: &Cli,
    refreshed: bool,
    message: &str,
    expires_at: Option<String>,
) -> Result<()> {
    if out.is_json() {
        let value = serde_json::json!({
            "refreshed": refreshed,
            "message": message,
            "expiresAt": expires_at,
        });
        println!("{}", out.json.format(&value)?);
    } else if !cli.quiet {
        match expires_at {
            Some(at) => println!("{message} (expires {at})"),
            None => println!("{message}"),
        }
    }
    Ok(())
}
