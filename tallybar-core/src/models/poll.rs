//! Poll results as seen by subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::usage::UsageSnapshot;

/// Why a poll produced no snapshot.
///
/// Cloneable so one failure can fan out to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PollError {
    /// No credential is available.
    #[error("Not authenticated. Run `claude` to log in.")]
    NotAuthenticated,

    /// The token was expired or rejected and could not be refreshed.
    #[error("Session expired and token refresh failed. Run `claude` to log in again.")]
    RefreshFailed,

    /// The server rejected the token even after a refresh.
    #[error("Unauthorized after token refresh")]
    Unauthorized,

    /// The server answered with a non-success status.
    #[error("Usage API returned status {0}")]
    Status(u16),

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Transport(String),

    /// The response body could not be understood.
    #[error("Failed to parse usage response: {0}")]
    Parse(String),
}

impl PollError {
    /// Returns true if the user must log in again.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::RefreshFailed | Self::Unauthorized
        )
    }
}

/// One published poll result.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    /// The snapshot, or why there is none.
    pub result: Result<UsageSnapshot, PollError>,
    /// When the poll finished.
    pub at: DateTime<Utc>,
}

impl UsageEvent {
    /// Creates a success event.
    pub fn success(snapshot: UsageSnapshot) -> Self {
        Self {
            result: Ok(snapshot),
            at: Utc::now(),
        }
    }

    /// Creates a failure event.
    pub fn failure(error: PollError) -> Self {
        Self {
            result: Err(error),
            at: Utc::now(),
        }
    }

    /// Returns the snapshot, if the poll succeeded.
    pub fn snapshot(&self) -> Option<&UsageSnapshot> {
        self.result.as_ref().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_login() {
        assert!(PollError::NotAuthenticated.needs_login());
        assert!(PollError::RefreshFailed.needs_login());
        assert!(PollError::Unauthorized.needs_login());
        assert!(!PollError::Status(500).needs_login());
        assert!(!PollError::Transport("reset".into()).needs_login());
    }

    #[test]
    fn test_event_snapshot_accessor() {
        let ok = UsageEvent::success(UsageSnapshot::new());
        assert!(ok.snapshot().is_some());

        let err = UsageEvent::failure(PollError::Status(503));
        assert!(err.snapshot().is_none());
        assert_eq!(err.result.unwrap_err().to_string(), "Usage API returned status 503");
    }

    #[test]
    fn test_poll_error_serde() {
        let json = serde_json::to_value(PollError::Status(429)).unwrap();
        assert_eq!(json["kind"], "status");
        assert_eq!(json["detail"], 429);
    }
}
