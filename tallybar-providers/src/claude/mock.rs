//! Scripted [`HttpTransport`] for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tallybar_fetch::{FetchError, HttpReply, HttpTransport};
use tokio::sync::Notify;

/// A scripted response; `None` simulates a timeout.
type Scripted = Option<HttpReply>;

/// Transport that answers from per-method queues and counts calls.
///
/// An empty queue answers 500. With a gate set, every call waits for one
/// `notify_one` before answering.
#[derive(Default)]
pub(crate) struct MockTransport {
    posts: Mutex<VecDeque<Scripted>>,
    gets: Mutex<VecDeque<Scripted>>,
    post_calls: AtomicUsize,
    get_calls: AtomicUsize,
    post_bodies: Mutex<Vec<serde_json::Value>>,
    bearers: Mutex<Vec<String>>,
    gate: Option<Arc<Notify>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub(crate) fn push_post(&self, status: u16, body: &str) {
        self.posts
            .lock()
            .unwrap()
            .push_back(Some(HttpReply::new(status, body)));
    }

    pub(crate) fn push_get(&self, status: u16, body: &str) {
        self.gets
            .lock()
            .unwrap()
            .push_back(Some(HttpReply::new(status, body)));
    }

    pub(crate) fn push_get_timeout(&self) {
        self.gets.lock().unwrap().push_back(None);
    }

    pub(crate) fn post_calls(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn post_bodies(&self) -> Vec<serde_json::Value> {
        self.post_bodies.lock().unwrap().clone()
    }

    pub(crate) fn bearers(&self) -> Vec<String> {
        self.bearers.lock().unwrap().clone()
    }

    async fn answer(&self, scripted: Option<Scripted>) -> Result<HttpReply, FetchError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match scripted {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(FetchError::Timeout(30)),
            None => Ok(HttpReply::new(500, "unscripted")),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(
        &self,
        _url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, FetchError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        self.post_bodies.lock().unwrap().push(body.clone());
        let scripted = self.posts.lock().unwrap().pop_front();
        self.answer(scripted).await
    }

    async fn get(&self, _url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, FetchError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, value)) = headers.iter().find(|(name, _)| *name == "Authorization") {
            let token = value.trim_start_matches("Bearer ").to_string();
            self.bearers.lock().unwrap().push(token);
        }
        let scripted = self.gets.lock().unwrap().pop_front();
        self.answer(scripted).await
    }
}

/// Writes a credentials file expiring at `expires_at_ms` into `dir`.
pub(crate) async fn write_credentials(
    dir: &std::path::Path,
    access: &str,
    refresh: &str,
    expires_at_ms: i64,
) -> std::path::PathBuf {
    let path = dir.join(".credentials.json");
    let json = serde_json::json!({
        "claudeAiOauth": {
            "accessToken": access,
            "refreshToken": refresh,
            "expiresAt": expires_at_ms,
            "scopes": ["user:inference", "user:profile"],
            "subscriptionType": "max"
        },
        "otherTool": {"keep": true}
    });
    tokio::fs::write(&path, serde_json::to_string_pretty(&json).unwrap())
        .await
        .unwrap();
    path
}

/// Epoch milliseconds `hours` from now.
pub(crate) fn ms_from_now(hours: i64) -> i64 {
    (chrono::Utc::now() + chrono::Duration::hours(hours)).timestamp_millis()
}
