//! Claude (Anthropic) usage via the OAuth usage API.
//!
//! The `claude` CLI keeps an OAuth credential on disk. This module reads
//! it, keeps it fresh and uses it to query the rate-limit usage endpoint.
//!
//! ## OAuth Credentials
//!
//! Credentials are stored in `~/.claude/.credentials.json`:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:inference", "user:profile"],
//!     "subscriptionType": "pro"
//!   }
//! }
//! ```
//!
//! Other top-level keys belong to the CLI and are written back untouched.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tallybar_fetch::{HttpClient, HttpTransport};
//! use tallybar_providers::claude::{
//!     ClaudeApiClient, CredentialStore, TokenRefresher, UsagePoller, default_credentials_path,
//! };
//! use tallybar_store::UsageStore;
//!
//! let http: Arc<dyn HttpTransport> = Arc::new(HttpClient::new()?);
//! let credentials = Arc::new(CredentialStore::new(default_credentials_path().unwrap()));
//! let refresher = Arc::new(TokenRefresher::new(Arc::clone(&credentials), Arc::clone(&http)));
//! let poller = UsagePoller::new(
//!     credentials,
//!     refresher,
//!     ClaudeApiClient::new(http),
//!     Arc::new(UsageStore::new()),
//! );
//! let outcome = poller.poll().await;
//! ```

// Modules
mod api;
mod credentials;
mod error;
mod poller;
mod refresher;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports
pub use api::{
    ANTHROPIC_BETA, ApiExtraUsage, ApiWindow, ClaudeApiClient, USAGE_URL, UsageApiResponse,
};
pub use credentials::{CACHE_TTL, CredentialStore, default_credentials_path};
pub use error::ClaudeError;
pub use poller::{PollOutcome, UsagePoller};
pub use refresher::{CLIENT_ID, TOKEN_ENDPOINT, TokenRefresher, TokenResponse};
