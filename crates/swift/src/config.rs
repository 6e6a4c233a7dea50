//! Configuration for the SWIFT filesystem
//!
//! Reads config from ~/.config/swiftfs/config.toml
//!
//! ```toml
//! verify_uploads = true
//! block_size = 5242880
//!
//! [client]
//! timeout_secs = 60
//!
//! [[auth]]
//! url = "https://swift.example.com/v1/AUTH_project"
//! token = "gAAAAAB..."
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use swiftfs_vfs::DEFAULT_BLOCK_SIZE;

use crate::auth::AuthEntry;
use crate::transport::ClientOptions;

/// Retry budget for failed requests.
///
/// Requests are not retried yet: failures surface on the first attempt.
pub const MAX_RETRIES: u32 = 2;

const fn default_verify_uploads() -> bool {
    true
}

const fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

/// Full filesystem configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SwiftConfig {
    /// Tokens by URL prefix, first match wins
    #[serde(default)]
    pub auth: Vec<AuthEntry>,
    /// Send an `ETag` with uploads so the server rejects corrupted bodies
    #[serde(default = "default_verify_uploads")]
    pub verify_uploads: bool,
    /// Block size of buffered file handles
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default)]
    pub client: ClientOptions,
}

impl Default for SwiftConfig {
    fn default() -> Self {
        Self {
            auth: Vec::new(),
            verify_uploads: default_verify_uploads(),
            block_size: default_block_size(),
            client: ClientOptions::default(),
        }
    }
}

impl SwiftConfig {
    /// Defaults plus the token from `OS_AUTH_TOKEN` / `OS_STORAGE_URL`
    pub fn from_env() -> Self {
        Self::default().with_env_auth()
    }

    /// Load configuration from default path, falling back to defaults
    pub fn load() -> Self {
        let config_path = Self::default_config_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from_path(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "ignoring unreadable config"
                );
                Self::default()
            }
        }
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swiftfs")
            .join("config.toml")
    }

    /// Load from a specific TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        for entry in &config.auth {
            entry.validate()?;
        }
        Ok(config)
    }

    /// Append an auth entry
    #[must_use]
    pub fn with_auth(mut self, entry: AuthEntry) -> Self {
        self.auth.push(entry);
        self
    }

    /// Append the environment token after the explicit entries, so explicit
    /// entries win where prefixes overlap
    #[must_use]
    pub fn with_env_auth(mut self) -> Self {
        if let Some(entry) = AuthEntry::from_env() {
            tracing::debug!(url = %entry.url, "using auth token from environment");
            self.auth.push(entry);
        }
        self
    }

    /// Non-secret settings rendered as a stable string
    pub fn fingerprint(&self) -> String {
        let prefixes: Vec<&str> = self.auth.iter().map(|entry| entry.url.as_str()).collect();
        serde_json::json!({
            "auth_urls": prefixes,
            "verify_uploads": self.verify_uploads,
            "block_size": self.block_size,
            "client": self.client,
        })
        .to_string()
    }
}
