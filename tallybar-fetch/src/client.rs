//! HTTP client abstractions.
//!
//! [`HttpTransport`] is the seam the OAuth and usage calls go through;
//! [`HttpClient`] is the reqwest-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::FetchError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for `TallyBar`.
const USER_AGENT: &str = concat!("tallybar/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Reply
// ============================================================================

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpReply {
    /// Creates a reply.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for a 401 status.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Minimal HTTP surface used by the OAuth client.
///
/// Implementations must not treat non-2xx statuses as errors; only
/// transport failures are `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POSTs `body` as JSON.
    async fn post_json(&self, url: &str, body: &serde_json::Value)
    -> Result<HttpReply, FetchError>;

    /// GETs `url` with extra headers.
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, FetchError>;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// reqwest-backed [`HttpTransport`] with a request timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn read(&self, result: Result<Response, reqwest::Error>) -> Result<HttpReply, FetchError> {
        let response = result.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        debug!(status, "Response received");
        let body = response.text().await.map_err(|e| self.classify(e))?;
        Ok(HttpReply { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    #[instrument(skip(self, body), fields(url = %url))]
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpReply, FetchError> {
        debug!("POST request with JSON");
        let result = self.inner.post(url).json(body).send().await;
        self.read(result).await
    }

    // Headers are skipped: they carry the bearer token.
    #[instrument(skip(self, headers), fields(url = %url))]
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, FetchError> {
        debug!("GET request with headers");
        let mut request = self.inner.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let result = request.send().await;
        self.read(result).await
    }
}

// ============================================================================
// Tests
// ============================================================================
