// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TallyBar` Fetch
//!
//! HTTP plumbing for the `TallyBar` usage agent.
//!
//! This crate provides:
//!
//! - [`client::HttpTransport`] - The HTTP seam used by the OAuth calls
//! - [`client::HttpClient`] - reqwest-backed transport with a 30 s timeout
//! - [`flight::SingleFlight`] - Coalesces concurrent runs of one operation
//!
//! ## Example
//!
//! ```ignore
//! use tallybar_fetch::{HttpClient, HttpTransport};
//!
//! let client = HttpClient::new()?;
//! let reply = client.get("https://api.anthropic.com/api/oauth/usage", &[]).await?;
//! if reply.is_success() {
//!     let body: serde_json::Value = reply.json()?;
//! }
//! ```

pub mod client;
pub mod error;
pub mod flight;

// Re-export key types at crate root
pub use client::{DEFAULT_TIMEOUT_SECS, HttpClient, HttpReply, HttpTransport};
pub use error::FetchError;
pub use flight::SingleFlight;
