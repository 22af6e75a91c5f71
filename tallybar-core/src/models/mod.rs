//! Domain models for `TallyBar`.
//!
//! ## Submodules
//!
//! - [`credential`] - Delegated OAuth credential and its backing document
//! - [`usage`] - Usage snapshot and rate-limit windows
//! - [`alert`] - Alert state and decisions
//! - [`poll`] - Poll failures and published poll events

mod alert;
mod credential;
mod poll;
mod usage;

// Re-export everything at the models level
pub use alert::{
    Alert, AlertEvaluation, AlertKind, AlertState, DEFAULT_ALERT_THRESHOLD, MAX_ALERT_THRESHOLD,
    MIN_ALERT_THRESHOLD,
};
pub use credential::{Credential, CredentialsDocument, EXPIRY_MARGIN_MINUTES, OAUTH_KEY};
pub use poll::{PollError, UsageEvent};
pub use usage::{
    CRITICAL_PERCENT, ExtraUsage, UsageLevel, UsageSnapshot, UsageWindow, WARNING_PERCENT,
};
