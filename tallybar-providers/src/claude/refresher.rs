//! OAuth token refresh.
//!
//! Exchanges the stored refresh token for a new access token and writes the
//! result back to the credentials file. Concurrent callers share a single
//! exchange.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use tallybar_core::Credential;
use tallybar_fetch::{HttpTransport, SingleFlight};
use tracing::{debug, info, instrument, warn};

use super::credentials::CredentialStore;

// ============================================================================
// Constants
// ============================================================================

/// OAuth client id of the Claude CLI.
pub const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// Token endpoint.
pub const TOKEN_ENDPOINT: &str = "https://console.anthropic.com/api/oauth/token";

// ============================================================================
// Token Response
// ============================================================================

/// Body of a successful token exchange.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if the server issued one.
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Token type, normally `Bearer`.
    pub token_type: String,
}

impl TokenResponse {
    /// Applies the response to `credential` as of `now`.
    ///
    /// Returns false if the response carries no access token, in which case
    /// `credential` is left untouched.
    pub fn apply(&self, credential: &mut Credential, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }

        credential.access_token.clone_from(&self.access_token);

        if let Some(refresh) = self.refresh_token.as_deref().filter(|r| !r.is_empty()) {
            credential.refresh_token = refresh.to_string();
        }

        if self.expires_in > 0 {
            match TimeDelta::try_seconds(self.expires_in).and_then(|d| now.checked_add_signed(d)) {
                Some(expires_at) => credential.expires_at = expires_at,
                None => warn!(expires_in = self.expires_in, "Ignoring out-of-range expires_in"),
            }
        }

        true
    }
}

// ============================================================================
// Refresher
// ============================================================================

/// Refreshes the OAuth access token, at most one exchange at a time.
pub struct TokenRefresher {
    credentials: Arc<CredentialStore>,
    http: Arc<dyn HttpTransport>,
    endpoint: String,
    client_id: String,
    flight: SingleFlight<bool>,
}

impl TokenRefresher {
    /// Creates a refresher using the production endpoint.
    pub fn new(credentials: Arc<CredentialStore>, http: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            http,
            endpoint: TOKEN_ENDPOINT.to_string(),
            client_id: CLIENT_ID.to_string(),
            flight: SingleFlight::new(),
        }
    }

    /// Points the refresher at another token endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns true if `credential` is within five minutes of expiry.
    pub fn is_expired(credential: &Credential) -> bool {
        credential.is_expired()
    }

    /// Returns true while an exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.flight.is_running()
    }

    /// Refreshes the access token.
    ///
    /// Callers arriving while an exchange is running wait for it and get
    /// its result. Returns false if there is no usable refresh token, the
    /// server rejects the exchange, or the new credential cannot be saved.
    pub async fn refresh(&self) -> bool {
        let credentials = Arc::clone(&self.credentials);
        let http = Arc::clone(&self.http);
        let endpoint = self.endpoint.clone();
        let client_id = self.client_id.clone();

        self.flight
            .run(move || exchange(credentials, http, endpoint, client_id))
            .await
    }
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("endpoint", &self.endpoint)
            .field("flight", &self.flight)
            .finish_non_exhaustive()
    }
}

#[instrument(skip_all, fields(endpoint = %endpoint))]
async fn exchange(
    credentials: Arc<CredentialStore>,
    http: Arc<dyn HttpTransport>,
    endpoint: String,
    client_id: String,
) -> bool {
    let Some(mut credential) = credentials.get(true).await else {
        warn!("No credential to refresh");
        return false;
    };

    if !credential.has_refresh_token() {
        warn!("Credential has no refresh token");
        return false;
    }

    let body = serde_json::json!({
        "grant_type": "refresh_token",
        "refresh_token": credential.refresh_token,
        "client_id": client_id,
    });

    debug!("Requesting token refresh");
    let reply = match http.post_json(&endpoint, &body).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Token refresh request failed");
            return false;
        }
    };

    if !reply.is_success() {
        warn!(status = reply.status, "Token refresh rejected");
        return false;
    }

    let response: TokenResponse = match reply.json() {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Failed to parse token response");
            return false;
        }
    };

    if !response.apply(&mut credential, Utc::now()) {
        warn!("Token response has no access token");
        return false;
    }

    let saved = credentials.persist(&credential).await;
    if saved {
        info!(expires_at = %credential.expires_at, "Token refreshed");
    }
    saved
}

// ============================================================================
// Tests
// ============================================================================
