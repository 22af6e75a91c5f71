// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Providers
//!
//! Provider implementations for the `TallyBar` usage agent.
//!
//! The only provider is Claude, read through the OAuth credential the
//! `claude` CLI leaves on disk:
//!
//! - **Credentials**: cached reads and secure write-back of the credential file
//! - **Refresher**: single-flight OAuth refresh-token exchange
//! - **API**: usage endpoint client and response mapping
//! - **Poller**: one guarded poll, published to the usage store
//!
//! See [`claude`] for a wiring example.

pub mod claude;

pub use claude::{
    ClaudeApiClient, ClaudeError, CredentialStore, PollOutcome, TokenRefresher, UsagePoller,
    default_credentials_path,
};
