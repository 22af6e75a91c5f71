//! Single-flight execution.
//!
//! [`SingleFlight`] lets any number of callers ask for the same operation
//! while at most one instance runs. Callers arriving during a run attach to
//! it and receive a clone of its result; the next caller after completion
//! starts a fresh run.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

type Slot<T> = Arc<Mutex<Option<Shared<BoxFuture<'static, T>>>>>;

/// Coalesces concurrent runs of an operation into one.
pub struct SingleFlight<T: Clone> {
    slot: Slot<T>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an idle single-flight guard.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Runs `make()` unless a run is already in flight, in which case the
    /// caller waits for that run instead.
    ///
    /// The run keeps going if every waiter is dropped; the next caller
    /// picks it up where it left off.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(in_flight) = slot.as_ref() {
                debug!("Joining in-flight operation");
                in_flight.clone()
            } else {
                let done = Arc::clone(&self.slot);
                let work = make();
                let fut = async move {
                    let out = work.await;
                    *done.lock().unwrap_or_else(PoisonError::into_inner) = None;
                    out
                }
                .boxed()
                .shared();
                *slot = Some(fut.clone());
                fut
            }
        };
        shared.await
    }

    /// Returns true while a run is in flight.
    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let running = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("SingleFlight")
            .field("running", &running)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
