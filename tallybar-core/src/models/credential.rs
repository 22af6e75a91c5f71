//! Delegated OAuth credential types.
//!
//! The `claude` CLI owns `~/.claude/.credentials.json` and may rewrite it at
//! any time. `TallyBar` only ever replaces the `claudeAiOauth` object and
//! carries every other key through untouched.
//!
//! # Credentials Format
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:inference", "user:profile"],
//!     "subscriptionType": "max",
//!     "rateLimitTier": "default_claude_max_5x"
//!   },
//!   "mcpOAuth": { "...": "..." }
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Top-level key of the delegated OAuth object.
pub const OAUTH_KEY: &str = "claudeAiOauth";

/// Safety margin before `expires_at` at which a token counts as expired.
pub const EXPIRY_MARGIN_MINUTES: i64 = 5;

// ============================================================================
// Credential
// ============================================================================

/// Delegated OAuth credential.
///
/// `expires_at` is an absolute instant, stored on disk as epoch milliseconds.
/// Fields this crate does not know about are kept in `extra` so a
/// read-modify-write does not drop them.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Bearer token for the resource server.
    #[serde(default)]
    pub access_token: String,
    /// Refresh token; empty when the authorization server issued none.
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute expiry of `access_token`.
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Subscription type (e.g. "pro", "max").
    #[serde(default)]
    pub subscription_type: String,
    /// Rate limit tier.
    #[serde(default)]
    pub rate_limit_tier: String,
    /// Unknown fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    /// Creates a credential with the given tokens and expiry.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            scopes: Vec::new(),
            subscription_type: String::new(),
            rate_limit_tier: String::new(),
            extra: Map::new(),
        }
    }

    /// Returns true if the token is expired at `now`, margin included.
    ///
    /// A token expiring exactly `now + 5 min` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::minutes(EXPIRY_MARGIN_MINUTES))
            .is_none_or(|deadline| now >= deadline)
    }

    /// Returns true if the token is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if a refresh exchange can be attempted.
    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("subscription_type", &self.subscription_type)
            .field("rate_limit_tier", &self.rate_limit_tier)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Credentials Document
// ============================================================================

/// The whole credentials file.
///
/// Holds the raw JSON object so that sibling keys written by other tools
/// survive when the OAuth object is replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialsDocument {
    root: Map<String, Value>,
}

impl CredentialsDocument {
    /// Parses a credentials file.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not JSON or not a JSON object.
    pub fn parse(json: &str) -> Result<Self, CoreError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(CoreError::InvalidData(
                "credentials file is not a JSON object".to_string(),
            )),
        }
    }

    /// Extracts the OAuth credential, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the OAuth object exists but is malformed.
    pub fn credential(&self) -> Result<Option<Credential>, CoreError> {
        match self.root.get(OAUTH_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(Credential::deserialize(value)?)),
        }
    }

    /// Replaces the OAuth credential, leaving every other key untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be serialized.
    pub fn set_credential(&mut self, credential: &Credential) -> Result<(), CoreError> {
        self.root
            .insert(OAUTH_KEY.to_string(), serde_json::to_value(credential)?);
        Ok(())
    }

    /// Serializes the document as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = at(1_735_000_000);
        let margin = Duration::minutes(EXPIRY_MARGIN_MINUTES);

        let exact = Credential::new("a", "r", now + margin);
        assert!(exact.is_expired_at(now));

        let inside = Credential::new("a", "r", now + margin - Duration::seconds(1));
        assert!(inside.is_expired_at(now));

        let outside = Credential::new("a", "r", now + margin + Duration::milliseconds(1));
        assert!(!outside.is_expired_at(now));

        let past = Credential::new("a", "r", now - Duration::hours(1));
        assert!(past.is_expired_at(now));
    }

    #[test]
    fn test_parse_credential() {
        let json = r#"{
            "claudeAiOauth": {
                "accessToken": "sk-ant-oat01-test",
                "refreshToken": "sk-ant-ort01-test",
                "expiresAt": 1735000000000,
                "scopes": ["user:inference", "user:profile"],
                "subscriptionType": "max",
                "rateLimitTier": "default_claude_max_5x"
            }
        }"#;

        let doc = CredentialsDocument::parse(json).unwrap();
        let cred = doc.credential().unwrap().unwrap();

        assert_eq!(cred.access_token, "sk-ant-oat01-test");
        assert_eq!(cred.refresh_token, "sk-ant-ort01-test");
        assert_eq!(cred.expires_at, at(1_735_000_000));
        assert_eq!(cred.scopes, ["user:inference", "user:profile"]);
        assert_eq!(cred.subscription_type, "max");
        assert_eq!(cred.rate_limit_tier, "default_claude_max_5x");
        assert!(cred.extra.is_empty());
    }

    #[test]
    fn test_missing_oauth_key_is_none() {
        let doc = CredentialsDocument::parse(r#"{"other": 1}"#).unwrap();
        assert!(doc.credential().unwrap().is_none());

        let doc = CredentialsDocument::parse(r#"{"claudeAiOauth": null}"#).unwrap();
        assert!(doc.credential().unwrap().is_none());
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(CredentialsDocument::parse("[1, 2]").is_err());
        assert!(CredentialsDocument::parse("not json").is_err());
    }

    #[test]
    fn test_set_credential_preserves_siblings() {
        let json = r#"{
            "claudeAiOauth": {
                "accessToken": "old",
                "refreshToken": "r",
                "expiresAt": 1000,
                "futureField": {"nested": true}
            },
            "mcpOAuth": {"server": {"token": "keep-me"}},
            "version": 3
        }"#;

        let mut doc = CredentialsDocument::parse(json).unwrap();
        let mut cred = doc.credential().unwrap().unwrap();
        cred.access_token = "new".to_string();
        doc.set_credential(&cred).unwrap();

        let written = doc.to_json_pretty().unwrap();
        let reparsed = CredentialsDocument::parse(&written).unwrap();
        let cred = reparsed.credential().unwrap().unwrap();
        assert_eq!(cred.access_token, "new");
        assert_eq!(cred.extra["futureField"]["nested"], Value::Bool(true));

        let raw: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(raw["mcpOAuth"]["server"]["token"], "keep-me");
        assert_eq!(raw["version"], 3);
    }

    #[test]
    fn test_expires_at_written_as_millis() {
        let cred = Credential::new("a", "r", at(1_735_000_000));
        let value = serde_json::to_value(&cred).unwrap();
        assert_eq!(value["expiresAt"], Value::from(1_735_000_000_000_i64));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let cred = Credential::new("secret-access", "secret-refresh", at(0));
        let debug = format!("{cred:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }
}
