//! Token selection for `X-Auth-Token`
//!
//! Tokens are supplied from outside (a keystone login, `swift auth`, ...);
//! nothing here negotiates them. Each entry pairs a storage URL prefix with
//! the token valid below it.

use std::fmt;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use swiftfs_vfs::{Result, VfsError};

/// Header carrying the token
pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-auth-token");

/// Environment variable holding a token
pub const ENV_AUTH_TOKEN: &str = "OS_AUTH_TOKEN";

/// Environment variable holding the storage URL the token belongs to
pub const ENV_STORAGE_URL: &str = "OS_STORAGE_URL";

/// Token valid for every URL starting with `url`
#[derive(Clone, Deserialize)]
pub struct AuthEntry {
    pub url: String,
    token: SecretString,
}

impl AuthEntry {
    /// Create an entry; tokens must be valid header values
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let entry = Self {
            url: url.into(),
            token: SecretString::new(token.into()),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Check that the token can be sent as a header value
    pub fn validate(&self) -> Result<()> {
        HeaderValue::from_str(self.token.expose_secret())
            .map(|_| ())
            .map_err(|_| {
                VfsError::Config(format!(
                    "auth token for '{}' is not a valid header value",
                    self.url
                ))
            })
    }

    /// Entry from `OS_AUTH_TOKEN` / `OS_STORAGE_URL`
    pub fn from_env() -> Option<Self> {
        Self::from_vars(
            std::env::var(ENV_AUTH_TOKEN).ok(),
            std::env::var(ENV_STORAGE_URL).ok(),
        )
    }

    /// Entry from already-read variable values; both must be set and non-empty
    pub fn from_vars(token: Option<String>, url: Option<String>) -> Option<Self> {
        match (token, url) {
            (Some(token), Some(url)) if !token.is_empty() && !url.is_empty() => {
                let entry = Self::new(url, token);
                if let Err(e) = &entry {
                    tracing::warn!(error = %e, "ignoring auth token from environment");
                }
                entry.ok()
            }
            _ => None,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.starts_with(&self.url)
    }

    fn header_value(&self) -> Option<HeaderValue> {
        let mut value = HeaderValue::from_str(self.token.expose_secret()).ok()?;
        value.set_sensitive(true);
        Some(value)
    }
}

impl fmt::Debug for AuthEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthEntry")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Headers for a request to `url`: the first entry whose prefix matches wins
pub fn headers_for(url: &str, entries: &[AuthEntry]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = entries
        .iter()
        .find(|entry| entry.matches(url))
        .and_then(AuthEntry::header_value)
    {
        headers.insert(AUTH_TOKEN_HEADER, value);
    }
    headers
}
