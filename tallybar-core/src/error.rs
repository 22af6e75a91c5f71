//! Core error types for `TallyBar`.

use thiserror::Error;

/// Core error type for `TallyBar` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid data in a document or API response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
