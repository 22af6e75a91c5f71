// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Core
//!
//! Core types and models for the `TallyBar` usage agent.
//!
//! This crate provides the foundational data structures shared by every
//! other `TallyBar` crate:
//!
//! - The delegated OAuth credential and the on-disk document that holds it
//! - Usage snapshots and their rate-limit windows
//! - Alert state and alert decisions
//! - Error types
//!
//! ## Key Types
//!
//! ### Credentials
//! - [`Credential`] - Delegated OAuth access/refresh token pair
//! - [`CredentialsDocument`] - The credentials file, siblings preserved
//!
//! ### Usage Types
//! - [`UsageSnapshot`] - Most recent usage sample
//! - [`UsageWindow`] - Individual rate-limit window (5-hour, 7-day)
//! - [`ExtraUsage`] - Paid overage credits
//! - [`UsageLevel`] - Coarse severity used for display
//!
//! ### Polling
//! - [`UsageEvent`] - A published poll result
//! - [`PollError`] - Why a poll produced no snapshot
//!
//! ### Alerts
//! - [`AlertState`] - Persisted threshold and once-per-window bookkeeping
//! - [`Alert`] - A signaled alert and its [`AlertKind`]

pub mod error;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Credentials
    Credential,
    CredentialsDocument,
    OAUTH_KEY,
    // Usage types
    ExtraUsage,
    UsageLevel,
    UsageSnapshot,
    UsageWindow,
    // Polling
    PollError,
    UsageEvent,
    // Alerts
    Alert,
    AlertEvaluation,
    AlertKind,
    AlertState,
};
