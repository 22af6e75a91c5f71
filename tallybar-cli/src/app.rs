//! Shared wiring for the commands.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tallybar_fetch::{HttpClient, HttpTransport};
use tallybar_providers::claude::{
    ClaudeApiClient, CredentialStore, TokenRefresher, UsagePoller, default_credentials_path,
};
use tallybar_store::{AlertTracker, SettingsStore, UsageStore, default_settings_path};
use tracing::debug;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Every long-lived component, connected.
pub struct App {
    pub settings: Arc<SettingsStore>,
    pub credentials: Arc<CredentialStore>,
    pub refresher: Arc<TokenRefresher>,
    pub usage: Arc<UsageStore>,
    pub poller: Arc<UsagePoller>,
    pub alerts: Arc<AlertTracker>,
}

impl App {
    /// Builds the components from the CLI's path overrides.
    pub async fn build(cli: &Cli) -> Result<Self> {
        let settings = Arc::new(load_settings(cli).await);
        let credentials = Arc::new(CredentialStore::new(credentials_path(cli)?));
        debug!(
            credentials = %credentials.path().display(),
            settings = %settings.path().display(),
            "Wiring components"
        );

        let http: Arc<dyn HttpTransport> =
            Arc::new(HttpClient::new().context("Failed to create HTTP client")?);
        let refresher = Arc::new(TokenRefresher::new(
            Arc::clone(&credentials),
            Arc::clone(&http),
        ));
        let usage = Arc::new(UsageStore::new());
        let poller = Arc::new(UsagePoller::new(
            Arc::clone(&credentials),
            Arc::clone(&refresher),
            ClaudeApiClient::new(http),
            Arc::clone(&usage),
        ));
        let alerts = Arc::new(AlertTracker::new(Arc::clone(&settings)));

        Ok(Self {
            settings,
            credentials,
            refresher,
            usage,
            poller,
            alerts,
        })
    }
}

/// Loads settings from `--settings` or the default path.
pub async fn load_settings(cli: &Cli) -> SettingsStore {
    SettingsStore::load(settings_path(cli)).await
}

/// Resolves the settings file path.
pub fn settings_path(cli: &Cli) -> PathBuf {
    cli.settings.clone().unwrap_or_else(default_settings_path)
}

/// Resolves the credentials file path.
pub fn credentials_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.credentials {
        Some(path) => Ok(path.clone()),
        None => default_credentials_path().context("Cannot determine home directory"),
    }
}

/// Output formatters selected by the global flags.
pub struct Output {
    pub format: OutputFormat,
    pub text: TextFormatter,
    pub json: JsonFormatter,
}

impl Output {
    /// Creates formatters for `cli`.
    pub fn new(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            text: TextFormatter::new(!cli.no_color),
            json: JsonFormatter::new(cli.pretty),
        }
    }

    /// Returns true for JSON output.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}
