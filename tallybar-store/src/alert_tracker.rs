//! Usage alert tracking.
//!
//! Alerts users when usage crosses their threshold, at most once per
//! session reset window. The bookkeeping is persisted in the settings file
//! so a restart does not re-alert for a window already reported.

use std::sync::Arc;
use tallybar_core::{Alert, UsageSnapshot};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::settings_store::SettingsStore;

/// Capacity of the alert channel.
const ALERT_CAPACITY: usize = 8;

/// Decides when to alert and publishes the alerts it raises.
pub struct AlertTracker {
    settings: Arc<SettingsStore>,
    alerts: broadcast::Sender<Alert>,
}

impl AlertTracker {
    /// Creates a tracker persisting through `settings`.
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);
        Self { settings, alerts }
    }

    /// Evaluates a snapshot and returns the alert to signal, if any.
    ///
    /// No snapshot means no decision and no state change. The decision is
    /// made against the settings file as it is on disk, and the bookkeeping
    /// is written back only when it changed; a failed save is logged.
    pub async fn evaluate(&self, snapshot: Option<&UsageSnapshot>) -> Option<Alert> {
        let snapshot = snapshot?;

        let mut evaluation = None;
        let saved = self
            .settings
            .edit(|s| evaluation = Some(s.alert.evaluate(snapshot)))
            .await;
        if let Err(e) = saved {
            warn!(error = %e, "Failed to persist alert state");
        }

        let alert = evaluation?.alert?;
        info!(kind = %alert.kind, percent = alert.percent, "Usage alert");
        if self.alerts.send(alert.clone()).is_err() {
            debug!("No alert subscribers");
        }
        Some(alert)
    }

    /// Subscribes to raised alerts.
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
