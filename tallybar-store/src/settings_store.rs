//! User preferences store.
//!
//! Manages user settings with persistence and change notification. The alert
//! bookkeeping lives in the same file so it survives restarts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tallybar_core::AlertState;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json, save_json};

/// Default poll interval in minutes.
pub const DEFAULT_POLL_INTERVAL_MINUTES: u32 = 5;

/// Shortest accepted poll interval in minutes.
pub const MIN_POLL_INTERVAL_MINUTES: u32 = 1;

/// Longest accepted poll interval in minutes.
pub const MAX_POLL_INTERVAL_MINUTES: u32 = 60;

// ============================================================================
// Settings Types
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Minutes between polls, within `[1, 60]`.
    pub poll_interval_minutes: u32,

    /// Alert threshold, switch and once-per-window bookkeeping.
    #[serde(flatten)]
    pub alert: AlertState,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: DEFAULT_POLL_INTERVAL_MINUTES,
            alert: AlertState::default(),
        }
    }
}

impl Settings {
    /// Clamps a poll interval into the accepted range.
    pub fn clamp_poll_interval(minutes: u32) -> u32 {
        minutes.clamp(MIN_POLL_INTERVAL_MINUTES, MAX_POLL_INTERVAL_MINUTES)
    }

    /// Brings every value back into range.
    pub fn normalize(&mut self) {
        self.poll_interval_minutes = Self::clamp_poll_interval(self.poll_interval_minutes);
        self.alert.normalize();
    }

    /// Returns the poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_interval_minutes) * 60)
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Persistent settings store with change notifications.
///
/// The settings file is shared with other `tallybar` processes. Writes go
/// through [`edit`](Self::edit), which re-reads the file, applies the
/// change and writes the result back, so changes made elsewhere are kept
/// and adopted. [`reload`](Self::reload) picks up external changes without
/// writing. Every change to the in-memory copy bumps the version published
/// on [`subscribe`](Self::subscribe).
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
    notify: watch::Sender<u64>,
    version: Arc<RwLock<u64>>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Creates a store with default settings backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    fn with_settings(path: PathBuf, settings: Settings) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
            notify,
            version: Arc::new(RwLock::new(0)),
            write_lock: Mutex::new(()),
        }
    }

    /// Loads settings from the default path.
    pub async fn load_default() -> Self {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path.
    ///
    /// A missing or unreadable file yields defaults. Loaded values are
    /// clamped into range.
    pub async fn load(path: PathBuf) -> Self {
        let settings = match read_settings(&path).await {
            Ok(settings) => {
                info!(
                    path = %path.display(),
                    poll_interval_minutes = settings.poll_interval_minutes,
                    alert_threshold_percent = settings.alert.threshold_percent,
                    alert_enabled = settings.alert.enabled,
                    "Settings loaded"
                );
                settings
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load settings, using defaults");
                Settings::default()
            }
        };

        Self::with_settings(path, settings)
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Re-reads the settings file.
    ///
    /// Returns true, and notifies subscribers, when the file differs from
    /// the in-memory copy. A missing file means defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed;
    /// the in-memory copy is left unchanged.
    pub async fn reload(&self) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let fresh = read_settings(&self.path).await?;

        let changed = self.adopt(fresh).await;
        if changed {
            info!(path = %self.path.display(), "Settings changed on disk, reloaded");
        }
        Ok(changed)
    }

    /// Read-modify-write of the settings file.
    ///
    /// Applies `f` to the settings as currently on disk (the in-memory copy
    /// if the file is unreadable), clamps the result and writes it back
    /// when `f` changed anything. The result also replaces the in-memory
    /// copy, so changes other processes made are adopted. Subscribers are
    /// notified when the in-memory copy changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written. The in-memory
    /// copy is updated regardless.
    pub async fn edit<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Settings) -> R,
    {
        let _guard = self.write_lock.lock().await;

        let mut settings = match read_settings(&self.path).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Settings file unreadable, editing in-memory copy");
                self.get().await
            }
        };
        let before = settings.clone();
        let out = f(&mut settings);
        settings.normalize();

        let written = if settings == before {
            Ok(())
        } else {
            save_json(&self.path, &settings).await.map(|()| {
                debug!(path = %self.path.display(), "Settings saved");
            })
        };

        self.adopt(settings).await;
        written.map(|()| out)
    }

    /// Subscribes to settings changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    /// Replaces the in-memory copy, notifying when it changed.
    async fn adopt(&self, settings: Settings) -> bool {
        {
            let mut current = self.settings.write().await;
            if *current == settings {
                return false;
            }
            *current = settings;
        }
        self.notify_change().await;
        true
    }

    /// Notifies subscribers of a change.
    async fn notify_change(&self) {
        let mut version = self.version.write().await;
        *version += 1;
        let _ = self.notify.send(*version);
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Gets the poll interval.
    pub async fn poll_interval(&self) -> Duration {
        self.settings.read().await.poll_interval()
    }

    /// Gets the alert state.
    pub async fn alert_state(&self) -> AlertState {
        self.settings.read().await.alert.clone()
    }

    /// Sets the poll interval (clamped to 1–60 minutes) and saves.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn set_poll_interval_minutes(&self, minutes: u32) -> Result<u32, StoreError> {
        let clamped = Settings::clamp_poll_interval(minutes);
        let old = self
            .edit(|s| std::mem::replace(&mut s.poll_interval_minutes, clamped))
            .await?;
        info!(old, new = clamped, "Updated poll interval (minutes)");
        Ok(clamped)
    }

    /// Sets the alert threshold (clamped to 50–100 percent) and saves.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn set_alert_threshold_percent(&self, percent: i32) -> Result<i32, StoreError> {
        let clamped = AlertState::clamp_threshold(percent);
        let old = self
            .edit(|s| std::mem::replace(&mut s.alert.threshold_percent, clamped))
            .await?;
        info!(old, new = clamped, "Updated alert threshold (percent)");
        Ok(clamped)
    }

    /// Enables or disables alerts and saves.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn set_alert_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        let old = self
            .edit(|s| std::mem::replace(&mut s.alert.enabled, enabled))
            .await?;
        info!(old, new = enabled, "Updated alert enabled");
        Ok(())
    }
}

/// Reads and clamps the settings file; a missing file means defaults.
async fn read_settings(path: &Path) -> Result<Settings, StoreError> {
    let mut settings = match load_json::<Settings>(path).await {
        Ok(settings) => settings,
        Err(e) if e.is_not_found() => {
            debug!(path = %path.display(), "Settings file not found, using defaults");
            Settings::default()
        }
        Err(e) => return Err(e),
    };
    settings.normalize();
    Ok(settings)
}

// ============================================================================
// Tests
// ============================================================================
