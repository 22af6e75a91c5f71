//! Claude OAuth usage API.
//!
//! # API Endpoint
//!
//! ```text
//! GET https://api.anthropic.com/api/oauth/usage
//! Authorization: Bearer <access_token>
//! anthropic-beta: oauth-2025-04-20
//! ```
//!
//! # Response Format
//!
//! ```json
//! {
//!   "five_hour": {"utilization": 25.0, "resets_at": "2025-01-01T12:00:00Z"},
//!   "seven_day": {"utilization": 45.0, "resets_at": "2025-01-05T00:00:00Z"},
//!   "seven_day_opus": null,
//!   "seven_day_sonnet": {"utilization": 30.0, "resets_at": "2025-01-05T00:00:00Z"},
//!   "extra_usage": {"is_enabled": true, "monthly_limit": 100, "used_credits": 5, "utilization": 5.0}
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tallybar_core::{ExtraUsage, UsageSnapshot, UsageWindow};
use tallybar_fetch::{FetchError, HttpReply, HttpTransport};
use tracing::{debug, instrument};

use super::error::ClaudeError;

// ============================================================================
// Constants
// ============================================================================

/// Usage endpoint.
pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// Beta header value enabling OAuth access to the usage endpoint.
pub const ANTHROPIC_BETA: &str = "oauth-2025-04-20";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from the usage API.
///
/// Every field is optional; anything absent or `null` stays absent in the
/// resulting snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UsageApiResponse {
    /// 5-hour session window.
    pub five_hour: Option<ApiWindow>,
    /// 7-day window (all models).
    pub seven_day: Option<ApiWindow>,
    /// 7-day Opus window.
    pub seven_day_opus: Option<ApiWindow>,
    /// 7-day Sonnet window.
    pub seven_day_sonnet: Option<ApiWindow>,
    /// Paid overage credits.
    pub extra_usage: Option<ApiExtraUsage>,
}

/// Individual usage window from the API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiWindow {
    /// Utilization percentage, not clamped.
    pub utilization: Option<f64>,
    /// When this window resets (ISO 8601).
    pub resets_at: Option<String>,
}

impl ApiWindow {
    /// Parse the reset timestamp. Unparseable values are treated as absent.
    pub fn resets_at(&self) -> Option<DateTime<Utc>> {
        self.resets_at.as_deref().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
    }

    fn to_window(&self) -> UsageWindow {
        UsageWindow {
            utilization: self.utilization,
            resets_at: self.resets_at(),
        }
    }
}

/// Extra usage/credits information.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiExtraUsage {
    /// Whether extra usage is enabled.
    pub is_enabled: bool,
    /// Monthly credit limit.
    pub monthly_limit: Option<f64>,
    /// Credits used this month.
    pub used_credits: Option<f64>,
    /// Percentage of the monthly limit used.
    pub utilization: Option<f64>,
}

impl UsageApiResponse {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object of the expected
    /// shape.
    pub fn parse(body: &str) -> Result<Self, ClaudeError> {
        serde_json::from_str(body)
            .map_err(|e| ClaudeError::ParseError(e.to_string()))
    }

    /// Converts the response into a snapshot taken at `fetched_at`.
    ///
    /// Per-model weekly windows are keyed `opus` and `sonnet`.
    pub fn to_snapshot(&self, fetched_at: DateTime<Utc>) -> UsageSnapshot {
        let mut snapshot = UsageSnapshot::new();
        snapshot.fetched_at = fetched_at;
        snapshot.five_hour = self.five_hour.as_ref().map(ApiWindow::to_window);
        snapshot.seven_day = self.seven_day.as_ref().map(ApiWindow::to_window);

        for (model, window) in [("opus", &self.seven_day_opus), ("sonnet", &self.seven_day_sonnet)] {
            if let Some(window) = window {
                snapshot
                    .seven_day_by_model
                    .insert(model.to_string(), window.to_window());
            }
        }

        snapshot.extra_usage = self.extra_usage.as_ref().map(|extra| ExtraUsage {
            is_enabled: extra.is_enabled,
            monthly_limit: extra.monthly_limit,
            used_credits: extra.used_credits,
            utilization: extra.utilization,
        });

        snapshot
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Claude API client for fetching usage data.
#[derive(Clone)]
pub struct ClaudeApiClient {
    http: Arc<dyn HttpTransport>,
    url: String,
}

impl ClaudeApiClient {
    /// Create a client for the production endpoint.
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self {
            http,
            url: USAGE_URL.to_string(),
        }
    }

    /// Create a client with a custom endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests usage with `access_token`.
    ///
    /// Any status is returned as a reply; only transport failures are
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails before a response arrives.
    #[instrument(skip(self, access_token), fields(url = %self.url))]
    pub async fn fetch_usage(&self, access_token: &str) -> Result<HttpReply, FetchError> {
        let bearer = format!("Bearer {access_token}");
        let headers = [
            ("Authorization", bearer.as_str()),
            ("anthropic-beta", ANTHROPIC_BETA),
            ("Accept", "application/json"),
        ];

        debug!("Fetching usage from API");
        let reply = self.http.get(&self.url, &headers).await?;
        debug!(status = reply.status, len = reply.body.len(), "Received API response");
        Ok(reply)
    }
}

impl std::fmt::Debug for ClaudeApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeApiClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::mock::MockTransport;
    use chrono::TimeZone;

    const FULL: &str = r#"{
        "five_hour": {"utilization": 42.7, "resets_at": "2025-01-01T12:00:00+00:00"},
        "seven_day": {"utilization": 18.0, "resets_at": "2025-01-05T00:00:00Z"},
        "seven_day_oauth_apps": null,
        "seven_day_opus": null,
        "seven_day_sonnet": {"utilization": 9.5, "resets_at": null},
        "extra_usage": {"is_enabled": true, "monthly_limit": 5000, "used_credits": 120, "utilization": 2.4}
    }"#;

    #[test]
    fn test_parse_full_response() {
        let fetched = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let snap = UsageApiResponse::parse(FULL).unwrap().to_snapshot(fetched);

        assert_eq!(snap.fetched_at, fetched);
        assert_eq!(snap.session_percent(), 42);
        assert_eq!(snap.weekly_percent(), 18);
        assert_eq!(
            snap.five_hour.as_ref().unwrap().resets_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
        );

        assert!(snap.model_window("opus").is_none());
        let sonnet = snap.model_window("sonnet").unwrap();
        assert_eq!(sonnet.utilization, Some(9.5));
        assert!(sonnet.resets_at.is_none());

        let extra = snap.extra_usage.unwrap();
        assert!(extra.is_enabled);
        assert_eq!(extra.monthly_limit, Some(5000.0));
        assert_eq!(extra.used_credits, Some(120.0));
        assert_eq!(extra.utilization, Some(2.4));
    }

    #[test]
    fn test_parse_empty_object() {
        let snap = UsageApiResponse::parse("{}").unwrap().to_snapshot(Utc::now());
        assert!(snap.five_hour.is_none());
        assert!(snap.seven_day.is_none());
        assert!(snap.seven_day_by_model.is_empty());
        assert!(snap.extra_usage.is_none());
        assert_eq!(snap.session_percent(), 0);
    }

    #[test]
    fn test_null_utilization_and_bad_timestamp() {
        let body = r#"{"five_hour": {"utilization": null, "resets_at": "soon"}}"#;
        let snap = UsageApiResponse::parse(body).unwrap().to_snapshot(Utc::now());
        let window = snap.five_hour.unwrap();
        assert!(window.utilization.is_none());
        assert!(window.resets_at.is_none());
    }

    #[test]
    fn test_over_100_not_clamped() {
        let body = r#"{"seven_day": {"utilization": 112.0}}"#;
        let snap = UsageApiResponse::parse(body).unwrap().to_snapshot(Utc::now());
        assert_eq!(snap.weekly_percent(), 112);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = UsageApiResponse::parse("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ClaudeError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer() {
        let http = Arc::new(MockTransport::new());
        http.push_get(200, "{}");
        let client = ClaudeApiClient::new(Arc::clone(&http) as Arc<dyn HttpTransport>);

        let reply = client.fetch_usage("token-abc").await.unwrap();
        assert!(reply.is_success());
        assert_eq!(http.bearers(), vec!["token-abc".to_string()]);
        assert_eq!(client.url(), USAGE_URL);
    }
}
