// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Store
//!
//! State management for the `TallyBar` usage agent.
//!
//! This crate provides:
//!
//! - **`UsageStore`**: Latest usage sample, broadcast to subscribers
//! - **`SettingsStore`**: User preferences with persistence and a watch channel
//! - **`AlertTracker`**: Once-per-window usage alerts, persisted in settings
//! - **Persistence**: Atomic, owner-only JSON file I/O
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tallybar_store::{AlertTracker, SettingsStore, UsageStore};
//!
//! let settings = Arc::new(SettingsStore::load_default().await);
//! let usage = UsageStore::new();
//! let alerts = AlertTracker::new(Arc::clone(&settings));
//!
//! let mut rx = usage.subscribe();
//! while let Ok(event) = rx.recv().await {
//!     alerts.evaluate(event.snapshot()).await;
//! }
//! ```

pub mod alert_tracker;
pub mod error;
pub mod persistence;
pub mod settings_store;
pub mod usage_store;

pub use alert_tracker::AlertTracker;
pub use error::StoreError;
pub use persistence::{default_config_dir, default_settings_path, load_json, save_json, write_secure};
pub use settings_store::{
    DEFAULT_POLL_INTERVAL_MINUTES, MAX_POLL_INTERVAL_MINUTES, MIN_POLL_INTERVAL_MINUTES, Settings,
    SettingsStore,
};
pub use usage_store::UsageStore;
