//! Usage polling.
//!
//! One poll reads the credential, refreshes it when close to expiry, calls
//! the usage API (refreshing and retrying once on a 401) and publishes the
//! result to the [`UsageStore`].

use std::sync::Arc;

use chrono::Utc;
use tallybar_core::{Credential, PollError, UsageEvent, UsageSnapshot};
use tallybar_fetch::HttpReply;
use tallybar_store::UsageStore;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::api::{ClaudeApiClient, UsageApiResponse};
use super::credentials::CredentialStore;
use super::refresher::TokenRefresher;

/// What a call to [`UsagePoller::poll`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A fresh snapshot was published.
    Updated(UsageSnapshot),
    /// A failure was published.
    Failed(PollError),
    /// Another poll was in flight; nothing was done.
    Skipped,
}

impl PollOutcome {
    /// Returns the snapshot for an update.
    pub fn snapshot(&self) -> Option<&UsageSnapshot> {
        match self {
            Self::Updated(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Fetches usage, at most one poll at a time.
#[derive(Debug)]
pub struct UsagePoller {
    credentials: Arc<CredentialStore>,
    refresher: Arc<TokenRefresher>,
    api: ClaudeApiClient,
    store: Arc<UsageStore>,
    gate: Mutex<()>,
}

impl UsagePoller {
    /// Creates a poller publishing into `store`.
    pub fn new(
        credentials: Arc<CredentialStore>,
        refresher: Arc<TokenRefresher>,
        api: ClaudeApiClient,
        store: Arc<UsageStore>,
    ) -> Self {
        Self {
            credentials,
            refresher,
            api,
            store,
            gate: Mutex::new(()),
        }
    }

    /// Returns the store polls publish into.
    pub fn store(&self) -> &Arc<UsageStore> {
        &self.store
    }

    /// Polls once, unless a poll is already running.
    ///
    /// The result is published to the store: a success replaces the
    /// snapshot, a failure clears it.
    pub async fn poll(&self) -> PollOutcome {
        let Ok(_guard) = self.gate.try_lock() else {
            debug!("Poll already in flight, skipping");
            return PollOutcome::Skipped;
        };

        let event = match self.fetch().await {
            Ok(snapshot) => UsageEvent::success(snapshot),
            Err(e) => {
                debug!(needs_login = e.needs_login(), "Poll produced no snapshot");
                UsageEvent::failure(e)
            }
        };

        let outcome = match &event.result {
            Ok(snapshot) => PollOutcome::Updated(snapshot.clone()),
            Err(e) => PollOutcome::Failed(e.clone()),
        };
        self.store.publish(event).await;
        outcome
    }

    /// Manual poll request.
    pub async fn trigger(&self) -> PollOutcome {
        info!("Manual poll requested");
        self.poll().await
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<UsageSnapshot, PollError> {
        let mut credential = self
            .credentials
            .get(false)
            .await
            .ok_or(PollError::NotAuthenticated)?;

        if TokenRefresher::is_expired(&credential) {
            info!(expires_at = %credential.expires_at, "Token expired, refreshing");
            credential = self.refreshed_credential().await?;
        }

        let mut reply = self.request(&credential).await?;

        if reply.is_unauthorized() {
            info!("Token rejected, refreshing");
            credential = self.refreshed_credential().await?;
            reply = self.request(&credential).await?;
            if reply.is_unauthorized() {
                return Err(PollError::Unauthorized);
            }
        }

        if !reply.is_success() {
            return Err(PollError::Status(reply.status));
        }

        let response =
            UsageApiResponse::parse(&reply.body).map_err(|e| PollError::Parse(e.to_string()))?;
        Ok(response.to_snapshot(Utc::now()))
    }

    async fn refreshed_credential(&self) -> Result<Credential, PollError> {
        if !self.refresher.refresh().await {
            return Err(PollError::RefreshFailed);
        }
        self.credentials
            .get(true)
            .await
            .ok_or(PollError::NotAuthenticated)
    }

    async fn request(&self, credential: &Credential) -> Result<HttpReply, PollError> {
        self.api
            .fetch_usage(&credential.access_token)
            .await
            .map_err(|e| PollError::Transport(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::mock::{MockTransport, ms_from_now, write_credentials};
    use tallybar_core::AlertKind;
    use tallybar_fetch::HttpTransport;
    use tallybar_store::{AlertTracker, SettingsStore};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    const USAGE_95: &str = r#"{
        "five_hour": {"utilization": 95.0, "resets_at": "2025-02-01T15:00:00Z"},
        "seven_day": {"utilization": 40.0, "resets_at": "2025-02-05T00:00:00Z"}
    }"#;

    struct Harness {
        _dir: TempDir,
        http: Arc<MockTransport>,
        poller: UsagePoller,
    }

    fn harness_with(dir: TempDir, path: std::path::PathBuf, http: MockTransport) -> Harness {
        let http = Arc::new(http);
        let transport: Arc<dyn HttpTransport> = Arc::clone(&http) as Arc<dyn HttpTransport>;
        let credentials = Arc::new(CredentialStore::new(path));
        let refresher = Arc::new(TokenRefresher::new(
            Arc::clone(&credentials),
            Arc::clone(&transport),
        ));
        let poller = UsagePoller::new(
            credentials,
            refresher,
            ClaudeApiClient::new(transport),
            Arc::new(UsageStore::new()),
        );
        Harness {
            _dir: dir,
            http,
            poller,
        }
    }

    async fn harness(access: &str, refresh: &str, expires_ms: i64) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(dir.path(), access, refresh, expires_ms).await;
        harness_with(dir, path, MockTransport::new())
    }

    #[tokio::test]
    async fn test_no_credential_is_not_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".credentials.json");
        let h = harness_with(dir, path, MockTransport::new());
        let mut rx = h.poller.store().subscribe();

        let outcome = h.poller.poll().await;

        assert_eq!(outcome, PollOutcome::Failed(PollError::NotAuthenticated));
        assert_eq!(h.http.get_calls(), 0);
        assert_eq!(h.http.post_calls(), 0);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.result, Err(PollError::NotAuthenticated));
        assert!(h.poller.store().snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_success_publishes_snapshot() {
        let h = harness("live", "r", ms_from_now(8)).await;
        h.http.push_get(200, USAGE_95);
        let mut rx = h.poller.store().subscribe();

        let outcome = h.poller.poll().await;

        let snap = outcome.snapshot().unwrap();
        assert_eq!(snap.session_percent(), 95);
        assert_eq!(snap.weekly_percent(), 40);
        assert_eq!(h.http.bearers(), vec!["live".to_string()]);
        assert_eq!(h.http.post_calls(), 0);
        assert_eq!(rx.recv().await.unwrap().snapshot(), Some(snap));
        assert_eq!(h.poller.store().snapshot().await.as_ref(), Some(snap));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_first() {
        let h = harness("stale", "r", ms_from_now(-1)).await;
        h.http
            .push_post(200, r#"{"access_token":"fresh","expires_in":28800}"#);
        h.http.push_get(200, USAGE_95);

        assert!(matches!(h.poller.poll().await, PollOutcome::Updated(_)));
        assert_eq!(h.http.post_calls(), 1);
        assert_eq!(h.http.bearers(), vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_retries_once() {
        let h = harness("revoked", "r", ms_from_now(8)).await;
        h.http.push_get(401, "");
        h.http
            .push_post(200, r#"{"access_token":"fresh","expires_in":28800}"#);
        h.http.push_get(200, USAGE_95);

        let outcome = h.poller.poll().await;

        assert_eq!(outcome.snapshot().unwrap().session_percent(), 95);
        assert_eq!(h.http.post_calls(), 1);
        assert_eq!(h.http.get_calls(), 2);
        assert_eq!(
            h.http.bearers(),
            vec!["revoked".to_string(), "fresh".to_string()]
        );
    }

    #[tokio::test]
    async fn test_second_unauthorized_fails() {
        let h = harness("revoked", "r", ms_from_now(8)).await;
        h.http.push_get(401, "");
        h.http
            .push_post(200, r#"{"access_token":"fresh","expires_in":28800}"#);
        h.http.push_get(401, "");

        assert_eq!(
            h.poller.poll().await,
            PollOutcome::Failed(PollError::Unauthorized)
        );
        assert_eq!(h.http.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_rejected_clears_snapshot() {
        let h = harness("live", "r", ms_from_now(8)).await;
        h.http.push_get(200, USAGE_95);
        assert!(matches!(h.poller.poll().await, PollOutcome::Updated(_)));

        h.http.push_get(401, "");
        h.http.push_post(400, r#"{"error":"invalid_grant"}"#);
        let outcome = h.poller.poll().await;

        assert_eq!(outcome, PollOutcome::Failed(PollError::RefreshFailed));
        assert!(h.poller.store().snapshot().await.is_none());
        assert_eq!(
            h.poller.store().error().await,
            Some(PollError::RefreshFailed)
        );
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_fails() {
        let h = harness("stale", "", ms_from_now(-1)).await;

        assert_eq!(
            h.poller.poll().await,
            PollOutcome::Failed(PollError::RefreshFailed)
        );
        assert_eq!(h.http.post_calls(), 0);
        assert_eq!(h.http.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let h = harness("live", "r", ms_from_now(8)).await;
        h.http.push_get(503, "unavailable");

        assert_eq!(
            h.poller.poll().await,
            PollOutcome::Failed(PollError::Status(503))
        );
    }

    #[tokio::test]
    async fn test_transport_and_parse_failures() {
        let h = harness("live", "r", ms_from_now(8)).await;
        h.http.push_get_timeout();
        assert!(matches!(
            h.poller.poll().await,
            PollOutcome::Failed(PollError::Transport(_))
        ));

        h.http.push_get(200, "not json");
        assert!(matches!(
            h.poller.poll().await,
            PollOutcome::Failed(PollError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_polls_share_one_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(dir.path(), "live", "r", ms_from_now(8)).await;
        let gate = Arc::new(Notify::new());
        let h = harness_with(dir, path, MockTransport::gated(Arc::clone(&gate)));
        h.http.push_get(200, USAGE_95);
        let mut rx = h.poller.store().subscribe();

        let release = async {
            while h.http.get_calls() == 0 {
                tokio::task::yield_now().await;
            }
            gate.notify_one();
        };
        let (first, second, ()) = tokio::join!(h.poller.poll(), h.poller.trigger(), release);

        assert!(matches!(first, PollOutcome::Updated(_)));
        assert_eq!(second, PollOutcome::Skipped);
        assert_eq!(h.http.get_calls(), 1);
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_feeds_alert_once() {
        let h = harness("live", "r", ms_from_now(8)).await;
        let settings_dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(settings_dir.path().join("settings.json")));
        let tracker = AlertTracker::new(settings);

        h.http.push_get(200, USAGE_95);
        h.http.push_get(200, USAGE_95);

        let first = h.poller.poll().await;
        let alert = tracker.evaluate(first.snapshot()).await.unwrap();
        assert_eq!(alert.kind, AlertKind::Session);
        assert_eq!(alert.percent, 95);

        let second = h.poller.poll().await;
        assert!(tracker.evaluate(second.snapshot()).await.is_none());
    }
}
