//! Latest usage state.
//!
//! Holds the most recent poll result and fans it out to subscribers. Only
//! the latest sample is kept; a failure clears the snapshot.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tallybar_core::{PollError, UsageEvent, UsageSnapshot};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

/// Capacity of the event channel. Slow subscribers skip older events.
const EVENT_CAPACITY: usize = 16;

// ============================================================================
// Inner State
// ============================================================================

/// Internal state for the usage store.
#[derive(Debug, Default)]
struct UsageStoreInner {
    /// Last successful snapshot, cleared on failure.
    snapshot: Option<UsageSnapshot>,
    /// Reason of the last failure, cleared on success.
    error: Option<PollError>,
    /// When the last poll finished.
    last_poll: Option<DateTime<Utc>>,
}

// ============================================================================
// Usage Store
// ============================================================================

/// State store for the latest usage sample.
///
/// Observable via a broadcast channel of [`UsageEvent`]s.
#[derive(Debug)]
pub struct UsageStore {
    inner: Arc<RwLock<UsageStoreInner>>,
    events: broadcast::Sender<UsageEvent>,
}

impl Default for UsageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageStore {
    /// Creates an empty usage store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(UsageStoreInner::default())),
            events,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Gets the latest snapshot.
    pub async fn snapshot(&self) -> Option<UsageSnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    /// Gets the last failure, if the last poll failed.
    pub async fn error(&self) -> Option<PollError> {
        self.inner.read().await.error.clone()
    }

    /// When the last poll finished.
    pub async fn last_poll(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_poll
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// Records a poll result and broadcasts it.
    pub async fn publish(&self, event: UsageEvent) {
        {
            let mut inner = self.inner.write().await;
            inner.last_poll = Some(event.at);
            match &event.result {
                Ok(snapshot) => {
                    info!(
                        session = snapshot.session_percent(),
                        weekly = snapshot.weekly_percent(),
                        "Usage updated"
                    );
                    inner.snapshot = Some(snapshot.clone());
                    inner.error = None;
                }
                Err(error) => {
                    warn!(error = %error, "Usage poll failed");
                    inner.snapshot = None;
                    inner.error = Some(error.clone());
                }
            }
        }

        if self.events.send(event).is_err() {
            debug!("No usage subscribers");
        }
    }

    /// Subscribes to poll results.
    pub fn subscribe(&self) -> broadcast::Receiver<UsageEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
