//! Claude OAuth credential file access.
//!
//! The `claude` CLI writes its OAuth credential to
//! `~/.claude/.credentials.json` and may rewrite it at any time. Reads are
//! cached briefly; writes replace only the `claudeAiOauth` object.
//!
//! There is no cross-process lock: if the CLI rewrites the file between our
//! read and our rename, its change is lost.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tallybar_core::{Credential, CredentialsDocument};
use tallybar_store::write_secure;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::error::ClaudeError;

/// How long a read stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Returns the path to the credentials file.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join(".credentials.json"))
}

// ============================================================================
// Cache
// ============================================================================

/// Result of the last file read.
#[derive(Debug)]
struct CachedCredential {
    credential: Option<Credential>,
    read_at: Instant,
}

impl CachedCredential {
    fn fresh(credential: Option<Credential>) -> Self {
        Self {
            credential,
            read_at: Instant::now(),
        }
    }
}

// ============================================================================
// Credential Store
// ============================================================================

/// Cached reader and writer for the credentials file.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    ttl: Duration,
    cache: Mutex<Option<CachedCredential>>,
}

impl CredentialStore {
    /// Creates a store for the given credentials file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: CACHE_TTL,
            cache: Mutex::new(None),
        }
    }

    /// Sets how long a read stays fresh.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the credentials file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current credential.
    ///
    /// Served from cache when the last read holds a credential and is
    /// younger than the TTL, unless `force_refresh` is set. Missing file,
    /// malformed JSON or a missing OAuth object yield `None`.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn get(&self, force_refresh: bool) -> Option<Credential> {
        let mut cache = self.cache.lock().await;

        if !force_refresh {
            if let Some(cached) = cache.as_ref() {
                if cached.read_at.elapsed() < self.ttl {
                    if let Some(credential) = &cached.credential {
                        debug!("Returning cached credential");
                        return Some(credential.clone());
                    }
                }
            }
        }

        let credential = self.read_credential().await;
        *cache = Some(CachedCredential::fresh(credential.clone()));
        credential
    }

    /// Writes `credential` back, preserving every other key in the file.
    ///
    /// Returns `false` on any read, serialization or write failure.
    #[instrument(skip(self, credential), fields(path = %self.path.display()))]
    pub async fn persist(&self, credential: &Credential) -> bool {
        let mut cache = self.cache.lock().await;

        match self.write_credential(credential).await {
            Ok(()) => {
                *cache = Some(CachedCredential::fresh(Some(credential.clone())));
                info!(expires_at = %credential.expires_at, "Credentials saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save credentials");
                false
            }
        }
    }

    async fn read_document(&self) -> Result<CredentialsDocument, ClaudeError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(CredentialsDocument::parse(&content)?)
    }

    async fn read_credential(&self) -> Option<Credential> {
        debug!("Reading credentials file");
        let result = match self.read_document().await {
            Ok(doc) => doc.credential().map_err(ClaudeError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(Some(credential)) => {
                info!(expires_at = %credential.expires_at, "Credentials loaded");
                Some(credential)
            }
            Ok(None) => {
                warn!("Credentials file has no claudeAiOauth section");
                None
            }
            Err(ClaudeError::CredentialsNotFound) => {
                warn!("Credentials file not found");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read credentials file");
                None
            }
        }
    }

    async fn write_credential(&self, credential: &Credential) -> Result<(), ClaudeError> {
        let mut doc = self.read_document().await?;
        doc.set_credential(credential)?;
        let json = doc.to_json_pretty()?;
        write_secure(&self.path, &json).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
