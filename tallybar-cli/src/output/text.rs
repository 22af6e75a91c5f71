//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Utc};
use std::path::Path;
use tallybar_core::{Alert, PollError, UsageLevel, UsageSnapshot, UsageWindow};
use tallybar_store::Settings;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats a usage snapshot as of `now`.
    pub fn format_usage(&self, snapshot: &UsageSnapshot, now: DateTime<Utc>) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} {}",
            self.bold("Claude Usage"),
            self.dim(&format!("({})", snapshot.level()))
        ));

        if !snapshot.has_data() {
            lines.push(self.dim("No usage reported"));
        }

        if let Some(session) = &snapshot.five_hour {
            lines.push(self.format_window("Session", session, session.reset_countdown(now)));
        }

        if let Some(weekly) = &snapshot.seven_day {
            let reset = weekly.reset_day_clock().map(|t| format!("Resets {t}"));
            lines.push(self.format_window("Weekly", weekly, reset));
        }

        for (model, window) in &snapshot.seven_day_by_model {
            let reset = window.reset_day_clock().map(|t| format!("Resets {t}"));
            lines.push(self.format_window(&capitalize(model), window, reset));
        }

        if let Some(extra) = snapshot.extra_usage.as_ref().filter(|e| e.is_enabled) {
            let used = extra.used_credits.unwrap_or(0.0);
            let mut line = match extra.monthly_limit {
                Some(limit) => format!("Extra:   {used:.2} / {limit:.2} credits"),
                None => format!("Extra:   {used:.2} credits"),
            };
            if let Some(pct) = extra.utilization {
                line.push_str(&format!(" ({pct:.0}%)"));
            }
            lines.push(line);
        }

        lines.push(self.dim(&format!(
            "Last updated: {}",
            snapshot.updated_label(now)
        )));

        lines.join("\n")
    }

    /// Formats a usage window with progress bar.
    fn format_window(&self, label: &str, window: &UsageWindow, reset: Option<String>) -> String {
        let percent = window.percent();
        let level = UsageLevel::from_percent(percent);
        let bar = self.progress_bar(percent);
        let pct = self.color_for_level(level, &format!("{percent:>3}%"));

        let mut result = format!("{:<8} {} {}", format!("{label}:"), bar, pct);
        if let Some(reset) = reset {
            result.push_str("  ");
            result.push_str(&self.dim(&reset));
        }
        result
    }

    /// Formats a progress bar for a used percentage.
    ///
    /// Values outside `[0, 100]` draw as empty or full.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_used: i32) -> String {
        let clamped = f64::from(percent_used.clamp(0, 100));
        let filled = ((clamped / 100.0) * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_level(UsageLevel::from_percent(percent_used), &bar)
    }

    /// Formats a poll failure, with a login hint when one applies.
    pub fn format_error(&self, error: &PollError) -> String {
        let mut line = format!("{}: {}", self.red("Error"), error);
        if matches!(error, PollError::Transport(_) | PollError::Status(_)) {
            line.push_str(&self.dim("  (will retry on the next poll)"));
        }
        line
    }

    /// Formats a usage alert.
    pub fn format_alert(&self, alert: &Alert) -> String {
        format!("{} {}", self.yellow(&format!("{}:", Alert::TITLE)), alert.message())
    }

    /// Formats the settings.
    pub fn format_settings(&self, settings: &Settings, path: &Path) -> String {
        let alert = &settings.alert;
        let mut lines = vec![
            self.bold("TallyBar Configuration"),
            "─".repeat(40),
            format!("Poll interval:   {} min", settings.poll_interval_minutes),
            format!("Alert threshold: {}%", alert.threshold_percent),
            format!("Alerts enabled:  {}", alert.enabled),
        ];
        if let Some(reset) = alert.last_alert_reset_time {
            lines.push(format!(
                "Last alert window: {}{}",
                reset.to_rfc3339(),
                if alert.alert_shown_for_current_window {
                    " (alerted)"
                } else {
                    ""
                }
            ));
        }
        lines.push(self.dim(&format!("File: {}", path.display())));
        lines.join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_level(&self, level: UsageLevel, text: &str) -> String {
        match level {
            UsageLevel::Normal => self.green(text),
            UsageLevel::Warning => self.yellow(text),
            UsageLevel::Critical => self.red(text),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
