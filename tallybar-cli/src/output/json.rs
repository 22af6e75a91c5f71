//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tallybar_core::{Alert, PollError, UsageEvent, UsageLevel, UsageSnapshot, UsageWindow};

// ============================================================================
// Output Types
// ============================================================================

/// Usage windows and derived values.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    pub session_percent: i32,
    pub weekly_percent: i32,
    pub level: UsageLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly: Option<WindowOutput>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, WindowOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_usage: Option<ExtraUsageOutput>,
    #[serde(serialize_with = "serialize_datetime")]
    pub fetched_at: DateTime<Utc>,
}

/// A single usage window.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
    pub percent: i32,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_datetime_opt")]
    pub resets_at: Option<DateTime<Utc>>,
}

/// Extra usage credits.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraUsageOutput {
    pub is_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_credits: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

/// A poll failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub error: PollError,
    pub message: String,
    pub needs_login: bool,
}

/// A usage alert.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOutput {
    pub title: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub alert: Alert,
}

/// One line of the daemon's JSON stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamLine {
    /// A successful poll.
    Usage(UsageOutput),
    /// A failed poll.
    Error(ErrorOutput),
    /// A raised alert.
    Alert(AlertOutput),
}

// ============================================================================
// Serialization helpers
// ============================================================================

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

#[allow(clippy::ref_option)]
fn serialize_datetime_opt<S>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a snapshot.
    pub fn format_usage(&self, snapshot: &UsageSnapshot) -> Result<String> {
        self.format(&usage_output(snapshot))
    }

    /// Formats a poll failure.
    pub fn format_error(&self, error: &PollError) -> Result<String> {
        self.format(&error_output(error))
    }

    /// Formats a poll event as a tagged stream line.
    pub fn format_event(&self, event: &UsageEvent) -> Result<String> {
        let line = match &event.result {
            Ok(snapshot) => StreamLine::Usage(usage_output(snapshot)),
            Err(error) => StreamLine::Error(error_output(error)),
        };
        self.format(&line)
    }

    /// Formats an alert as a tagged stream line.
    pub fn format_alert(&self, alert: &Alert) -> Result<String> {
        self.format(&StreamLine::Alert(AlertOutput {
            title: Alert::TITLE,
            message: alert.message(),
            alert: alert.clone(),
        }))
    }
}

fn usage_output(snapshot: &UsageSnapshot) -> UsageOutput {
    UsageOutput {
        session_percent: snapshot.session_percent(),
        weekly_percent: snapshot.weekly_percent(),
        level: snapshot.level(),
        session: snapshot.five_hour.as_ref().map(window_output),
        weekly: snapshot.seven_day.as_ref().map(window_output),
        models: snapshot
            .seven_day_by_model
            .iter()
            .map(|(model, window)| (model.clone(), window_output(window)))
            .collect(),
        extra_usage: snapshot.extra_usage.as_ref().map(|extra| ExtraUsageOutput {
            is_enabled: extra.is_enabled,
            monthly_limit: extra.monthly_limit,
            used_credits: extra.used_credits,
            utilization: extra.utilization,
        }),
        fetched_at: snapshot.fetched_at,
    }
}

fn window_output(window: &UsageWindow) -> WindowOutput {
    WindowOutput {
        utilization: window.utilization,
        percent: window.percent(),
        resets_at: window.resets_at,
    }
}

fn error_output(error: &PollError) -> ErrorOutput {
    ErrorOutput {
        error: error.clone(),
        message: error.to_string(),
        needs_login: error.needs_login(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tallybar_core::AlertKind;

    fn parse(s: &str) -> serde_json::Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn test_format_pretty() {
        let formatter = JsonFormatter::new(true);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_format_compact() {
        let formatter = JsonFormatter::new(false);
        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_usage_output_shape() {
        let reset = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();
        let mut snapshot = UsageSnapshot::new();
        snapshot.five_hour = Some(UsageWindow::new(72.5).resetting_at(reset));
        snapshot
            .seven_day_by_model
            .insert("opus".to_string(), UsageWindow::default());

        let value = parse(&JsonFormatter::new(false).format_usage(&snapshot).unwrap());
        assert_eq!(value["sessionPercent"], 72);
        assert_eq!(value["weeklyPercent"], 0);
        assert_eq!(value["level"], "warning");
        assert_eq!(value["session"]["utilization"], 72.5);
        assert_eq!(value["session"]["resetsAt"], "2025-03-01T15:00:00+00:00");
        assert!(value.get("weekly").is_none());
        assert_eq!(value["models"]["opus"]["percent"], 0);
        assert!(value["models"]["opus"].get("utilization").is_none());
    }

    #[test]
    fn test_event_lines_are_tagged() {
        let formatter = JsonFormatter::new(false);

        let ok = parse(
            &formatter
                .format_event(&UsageEvent::success(UsageSnapshot::new()))
                .unwrap(),
        );
        assert_eq!(ok["type"], "usage");

        let err = parse(
            &formatter
                .format_event(&UsageEvent::failure(PollError::Status(500)))
                .unwrap(),
        );
        assert_eq!(err["type"], "error");
        assert_eq!(err["error"]["kind"], "status");
        assert_eq!(err["error"]["detail"], 500);
        assert_eq!(err["needsLogin"], false);
    }

    #[test]
    fn test_alert_line() {
        let alert = Alert {
            kind: AlertKind::Session,
            percent: 95,
            resets_at: None,
        };
        let value = parse(&JsonFormatter::new(false).format_alert(&alert).unwrap());
        assert_eq!(value["type"], "alert");
        assert_eq!(value["title"], "Claude Usage Alert");
        assert_eq!(value["kind"], "session");
        assert_eq!(value["percent"], 95);
    }
}
