//! Usage-related types.
//!
//! This module contains the usage sample reported by the resource server:
//! - [`UsageSnapshot`] - Most recent sample with all windows
//! - [`UsageWindow`] - Individual rate-limit window
//! - [`ExtraUsage`] - Paid overage credits
//! - [`UsageLevel`] - Coarse severity derived from the percentages

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

/// Percentage at which the usage level turns to warning.
pub const WARNING_PERCENT: i32 = 70;

/// Percentage at which the usage level turns to critical.
pub const CRITICAL_PERCENT: i32 = 90;

// ============================================================================
// Usage Snapshot & Windows
// ============================================================================

/// A snapshot of usage data.
///
/// - **`five_hour`** = session window
/// - **`seven_day`** = weekly window
/// - **`seven_day_by_model`** = per-model weekly windows (`opus`, `sonnet`)
///
/// Replaced wholesale on every successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Session (5-hour) window.
    pub five_hour: Option<UsageWindow>,
    /// Weekly (7-day) window.
    pub seven_day: Option<UsageWindow>,
    /// Per-model weekly windows keyed by model family.
    #[serde(default)]
    pub seven_day_by_model: BTreeMap<String, UsageWindow>,
    /// Paid overage credits.
    pub extra_usage: Option<ExtraUsage>,
    /// When this snapshot was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Creates a new empty usage snapshot.
    pub fn new() -> Self {
        Self {
            five_hour: None,
            seven_day: None,
            seven_day_by_model: BTreeMap::new(),
            extra_usage: None,
            fetched_at: Utc::now(),
        }
    }

    /// Session percentage, truncated toward zero. Missing counts as 0.
    pub fn session_percent(&self) -> i32 {
        self.five_hour.as_ref().map_or(0, UsageWindow::percent)
    }

    /// Weekly percentage, truncated toward zero. Missing counts as 0.
    pub fn weekly_percent(&self) -> i32 {
        self.seven_day.as_ref().map_or(0, UsageWindow::percent)
    }

    /// Returns the highest of the session and weekly percentages.
    pub fn max_percent(&self) -> i32 {
        self.session_percent().max(self.weekly_percent())
    }

    /// Returns the display level for this snapshot.
    pub fn level(&self) -> UsageLevel {
        UsageLevel::from_percent(self.max_percent())
    }

    /// Returns a per-model window (`"opus"`, `"sonnet"`).
    pub fn model_window(&self, model: &str) -> Option<&UsageWindow> {
        self.seven_day_by_model.get(model)
    }

    /// Returns true if any window data is present.
    pub fn has_data(&self) -> bool {
        self.five_hour.is_some() || self.seven_day.is_some() || !self.seven_day_by_model.is_empty()
    }

    /// One-line summary in tray tooltip style.
    pub fn tooltip(&self) -> String {
        format!(
            "Claude: Session {}% | Week {}%",
            self.session_percent(),
            self.weekly_percent()
        )
    }

    /// "Last updated" label relative to `now`.
    pub fn updated_label(&self, now: DateTime<Utc>) -> String {
        let elapsed = now - self.fetched_at;
        let minutes = elapsed.num_minutes();
        if minutes < 1 {
            "Just now".to_string()
        } else if minutes < 60 {
            let plural = if minutes == 1 { "" } else { "s" };
            format!("{minutes} minute{plural} ago")
        } else {
            self.fetched_at.with_timezone(&Local).format("%-I:%M %p").to_string()
        }
    }
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Represents a single rate-limit window.
///
/// `utilization` is passed through as reported; it is not clamped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Percentage of the window used, if reported.
    pub utilization: Option<f64>,
    /// When this window resets.
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    /// Creates a new usage window with the given utilization.
    pub fn new(utilization: f64) -> Self {
        Self {
            utilization: Some(utilization),
            resets_at: None,
        }
    }

    /// Sets the reset time.
    #[must_use]
    pub fn resetting_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Utilization truncated toward zero. Missing counts as 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn percent(&self) -> i32 {
        self.utilization.unwrap_or(0.0).trunc() as i32
    }

    /// Returns time until reset, if known.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.resets_at.map(|reset| reset - now)
    }

    /// Countdown label ("Resets in 2 hr 5 min"), if the reset time is known.
    pub fn reset_countdown(&self, now: DateTime<Utc>) -> Option<String> {
        let remaining = self.time_until_reset(now)?;
        if remaining <= Duration::zero() {
            return Some("Resetting soon...".to_string());
        }
        let hours = remaining.num_hours();
        let minutes = remaining.num_minutes() % 60;
        Some(if hours > 0 {
            format!("Resets in {hours} hr {minutes} min")
        } else {
            format!("Resets in {minutes} min")
        })
    }

    /// Local reset clock time ("3:45 PM"), if known.
    pub fn reset_clock(&self) -> Option<String> {
        self.resets_at
            .map(|t| t.with_timezone(&Local).format("%-I:%M %p").to_string())
    }

    /// Local reset weekday and time ("Mon 3:45 PM"), if known.
    pub fn reset_day_clock(&self) -> Option<String> {
        self.resets_at
            .map(|t| t.with_timezone(&Local).format("%a %-I:%M %p").to_string())
    }
}

// ============================================================================
// Extra Usage
// ============================================================================

/// Paid overage credits beyond the plan limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraUsage {
    /// Whether overage billing is enabled.
    pub is_enabled: bool,
    /// Monthly spending limit.
    pub monthly_limit: Option<f64>,
    /// Credits used this month.
    pub used_credits: Option<f64>,
    /// Percentage of the monthly limit used.
    pub utilization: Option<f64>,
}

// ============================================================================
// Usage Level
// ============================================================================

/// Coarse severity used for icons and colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageLevel {
    /// Below 70%.
    Normal,
    /// 70% up to 90%.
    Warning,
    /// 90% and above.
    Critical,
}

impl UsageLevel {
    /// Classifies a percentage.
    pub fn from_percent(percent: i32) -> Self {
        if percent >= CRITICAL_PERCENT {
            Self::Critical
        } else if percent >= WARNING_PERCENT {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
