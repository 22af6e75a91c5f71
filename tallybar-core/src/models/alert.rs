//! Usage alert state and decisions.
//!
//! An alert fires at most once per session reset window: the shown flag is
//! only cleared when the session window's `resets_at` changes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::usage::UsageSnapshot;

/// Default alert threshold in percent.
pub const DEFAULT_ALERT_THRESHOLD: i32 = 90;

/// Lowest accepted alert threshold.
pub const MIN_ALERT_THRESHOLD: i32 = 50;

/// Highest accepted alert threshold.
pub const MAX_ALERT_THRESHOLD: i32 = 100;

// ============================================================================
// Alert State
// ============================================================================

/// Persisted alert configuration and once-per-window bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertState {
    /// Threshold in percent, within `[50, 100]`.
    #[serde(rename = "alertThresholdPercent")]
    pub threshold_percent: i32,
    /// Whether alerts are enabled.
    #[serde(rename = "alertEnabled")]
    pub enabled: bool,
    /// True between a signaled alert and the next session reset.
    pub alert_shown_for_current_window: bool,
    /// Session `resets_at` observed at the last evaluation.
    pub last_alert_reset_time: Option<DateTime<Utc>>,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_ALERT_THRESHOLD,
            enabled: true,
            alert_shown_for_current_window: false,
            last_alert_reset_time: None,
        }
    }
}

/// Result of [`AlertState::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvaluation {
    /// The alert to signal, if any.
    pub alert: Option<Alert>,
    /// True if the state was mutated and should be persisted.
    pub changed: bool,
}

impl AlertState {
    /// Clamps a threshold into the accepted range.
    pub fn clamp_threshold(percent: i32) -> i32 {
        percent.clamp(MIN_ALERT_THRESHOLD, MAX_ALERT_THRESHOLD)
    }

    /// Brings loaded values back into range.
    pub fn normalize(&mut self) {
        self.threshold_percent = Self::clamp_threshold(self.threshold_percent);
    }

    /// Decides whether `snapshot` should raise an alert.
    ///
    /// Session takes priority over weekly. Once an alert has been signaled
    /// nothing more fires until the session window resets.
    pub fn evaluate(&mut self, snapshot: &UsageSnapshot) -> AlertEvaluation {
        if !self.enabled {
            return AlertEvaluation {
                alert: None,
                changed: false,
            };
        }

        let mut changed = false;

        let session_reset = snapshot.five_hour.as_ref().and_then(|w| w.resets_at);
        if session_reset != self.last_alert_reset_time {
            self.alert_shown_for_current_window = false;
            self.last_alert_reset_time = session_reset;
            changed = true;
        }

        if self.alert_shown_for_current_window {
            return AlertEvaluation {
                alert: None,
                changed,
            };
        }

        let session = snapshot.session_percent();
        let weekly = snapshot.weekly_percent();

        let alert = if session >= self.threshold_percent {
            Some(Alert {
                kind: AlertKind::Session,
                percent: session,
                resets_at: session_reset,
            })
        } else if weekly >= self.threshold_percent {
            Some(Alert {
                kind: AlertKind::Weekly,
                percent: weekly,
                resets_at: snapshot.seven_day.as_ref().and_then(|w| w.resets_at),
            })
        } else {
            None
        };

        if alert.is_some() {
            self.alert_shown_for_current_window = true;
            changed = true;
        }

        AlertEvaluation { alert, changed }
    }
}

// ============================================================================
// Alert
// ============================================================================

/// Which window crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// The 5-hour session window.
    Session,
    /// The 7-day window.
    Weekly,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Weekly => write!(f, "weekly"),
        }
    }
}

/// A signaled usage alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Window that crossed the threshold.
    pub kind: AlertKind,
    /// Truncated percentage at the time of the alert.
    pub percent: i32,
    /// Reset time of that window, if known.
    pub resets_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Title shown with the alert.
    pub const TITLE: &'static str = "Claude Usage Alert";

    /// Human-readable alert text in local time.
    pub fn message(&self) -> String {
        let local = self.resets_at.map(|t| t.with_timezone(&chrono::Local));
        match self.kind {
            AlertKind::Session => format!(
                "Session usage at {}%! Resets at {}",
                self.percent,
                local.map(|t| t.format("%-I:%M %p").to_string()).unwrap_or_default()
            ),
            AlertKind::Weekly => format!(
                "Weekly usage at {}%! Resets {}",
                self.percent,
                local
                    .map(|t| t.format("%a %-I:%M %p").to_string())
                    .unwrap_or_default()
            ),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usage::UsageWindow;
    use chrono::TimeZone;

    fn reset_a() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap()
    }

    fn reset_b() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 20, 0, 0).unwrap()
    }

    fn snapshot(session: f64, weekly: f64, reset: DateTime<Utc>) -> UsageSnapshot {
        let mut s = UsageSnapshot::new();
        s.five_hour = Some(UsageWindow::new(session).resetting_at(reset));
        s.seven_day = Some(UsageWindow::new(weekly).resetting_at(reset_b()));
        s
    }

    #[test]
    fn test_session_alert_fires_once_per_window() {
        let mut state = AlertState::default();
        let snap = snapshot(95.0, 10.0, reset_a());

        let first = state.evaluate(&snap);
        let alert = first.alert.unwrap();
        assert_eq!(alert.kind, AlertKind::Session);
        assert_eq!(alert.percent, 95);
        assert_eq!(alert.resets_at, Some(reset_a()));
        assert!(first.changed);
        assert!(state.alert_shown_for_current_window);

        let second = state.evaluate(&snap);
        assert!(second.alert.is_none());
        assert!(!second.changed);
    }

    #[test]
    fn test_session_has_priority_over_weekly() {
        let mut state = AlertState::default();
        let alert = state.evaluate(&snapshot(91.0, 99.0, reset_a())).alert.unwrap();
        assert_eq!(alert.kind, AlertKind::Session);
    }

    #[test]
    fn test_weekly_alert() {
        let mut state = AlertState::default();
        let alert = state.evaluate(&snapshot(20.0, 92.4, reset_a())).alert.unwrap();
        assert_eq!(alert.kind, AlertKind::Weekly);
        assert_eq!(alert.percent, 92);
        assert_eq!(alert.resets_at, Some(reset_b()));
    }

    #[test]
    fn test_reset_change_clears_shown_flag() {
        let mut state = AlertState {
            alert_shown_for_current_window: true,
            last_alert_reset_time: Some(reset_a()),
            ..AlertState::default()
        };

        let eval = state.evaluate(&snapshot(10.0, 10.0, reset_b()));
        assert!(eval.alert.is_none());
        assert!(eval.changed);
        assert!(!state.alert_shown_for_current_window);
        assert_eq!(state.last_alert_reset_time, Some(reset_b()));
    }

    #[test]
    fn test_new_window_can_alert_again() {
        let mut state = AlertState::default();
        assert!(state.evaluate(&snapshot(95.0, 0.0, reset_a())).alert.is_some());
        assert!(state.evaluate(&snapshot(96.0, 0.0, reset_a())).alert.is_none());
        assert!(state.evaluate(&snapshot(97.0, 0.0, reset_b())).alert.is_some());
    }

    #[test]
    fn test_disabled_never_mutates() {
        let mut state = AlertState {
            enabled: false,
            ..AlertState::default()
        };
        let before = state.clone();
        let eval = state.evaluate(&snapshot(100.0, 100.0, reset_a()));
        assert!(eval.alert.is_none());
        assert!(!eval.changed);
        assert_eq!(state, before);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut state = AlertState {
            threshold_percent: 80,
            ..AlertState::default()
        };
        assert!(state.evaluate(&snapshot(80.9, 0.0, reset_a())).alert.is_some());

        let mut state = AlertState {
            threshold_percent: 80,
            ..AlertState::default()
        };
        assert!(state.evaluate(&snapshot(79.99, 0.0, reset_a())).alert.is_none());
    }

    #[test]
    fn test_normalize_clamps_threshold() {
        let mut state = AlertState {
            threshold_percent: 10,
            ..AlertState::default()
        };
        state.normalize();
        assert_eq!(state.threshold_percent, MIN_ALERT_THRESHOLD);

        state.threshold_percent = 150;
        state.normalize();
        assert_eq!(state.threshold_percent, MAX_ALERT_THRESHOLD);
    }

    #[test]
    fn test_serde_field_names() {
        let state = AlertState::default();
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["alertThresholdPercent"], 90);
        assert_eq!(value["alertEnabled"], true);
        assert_eq!(value["alertShownForCurrentWindow"], false);
        assert!(value["lastAlertResetTime"].is_null());
    }

    #[test]
    fn test_message_prefix() {
        let alert = Alert {
            kind: AlertKind::Weekly,
            percent: 93,
            resets_at: Some(reset_b()),
        };
        assert!(alert.message().starts_with("Weekly usage at 93%! Resets "));
    }
}
