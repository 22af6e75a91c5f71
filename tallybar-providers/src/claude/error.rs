//! Claude-specific error types.

use tallybar_core::CoreError;
use tallybar_fetch::FetchError;
use tallybar_store::StoreError;
use thiserror::Error;

/// Errors specific to Claude operations.
///
/// These stay inside the `claude` module: the public operations turn them
/// into `Option`, `bool` or [`tallybar_core::PollError`] after logging.
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// OAuth credentials file not found.
    #[error("OAuth credentials not found")]
    CredentialsNotFound,

    /// Failed to load credentials.
    #[error("Failed to load credentials: {0}")]
    CredentialsLoadError(String),

    /// Malformed credentials document.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(#[from] CoreError),

    /// Failed to write credentials.
    #[error("Failed to save credentials: {0}")]
    CredentialsSaveError(#[from] StoreError),

    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    HttpError(#[from] FetchError),

    /// Server answered with a non-success status.
    #[error("API returned status {0}")]
    ApiError(u16),

    /// Failed to parse a response.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<std::io::Error> for ClaudeError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            ClaudeError::CredentialsNotFound
        } else {
            ClaudeError::CredentialsLoadError(e.to_string())
        }
    }
}
