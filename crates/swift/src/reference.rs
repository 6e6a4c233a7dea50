//! SWIFT object references
//!
//! Two URL forms name the same object:
//!
//! - `swift://{host}/{account}/{container}/{object...}`
//! - `https://{host}/v1/{account}/{container}/{object...}`
//!
//! Object keys may contain `/`; everything after the container segment is
//! the key, unchanged.

use std::fmt;

use swiftfs_vfs::{Result, VfsError};

/// Native scheme
pub const SWIFT_SCHEME: &str = "swift";

/// Storage API version segment of HTTP URLs
pub const API_VERSION: &str = "v1";

/// Parsed `host / account / container / object` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwiftRef {
    pub host: String,
    pub account: String,
    pub container: Option<String>,
    /// Object key; only present together with `container`
    pub object: Option<String>,
}

fn non_empty(segment: &str) -> Option<String> {
    (!segment.is_empty()).then(|| segment.to_string())
}

impl SwiftRef {
    /// Parse a `swift://` or `https://` reference
    pub fn parse(url: &str) -> Result<Self> {
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(VfsError::UnsupportedScheme {
                scheme: String::new(),
                url: url.to_string(),
            });
        };

        // The HTTP form carries the API version in front of the account
        let skip = match scheme.to_ascii_lowercase().as_str() {
            SWIFT_SCHEME => 0,
            "https" => 1,
            _ => {
                return Err(VfsError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    url: url.to_string(),
                })
            }
        };

        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        if host.is_empty() {
            return Err(VfsError::invalid_path(url, "missing host"));
        }

        let mut segments = path.splitn(3 + skip, '/').skip(skip);
        let account = segments
            .next()
            .and_then(non_empty)
            .ok_or_else(|| VfsError::invalid_path(url, "missing account"))?;
        let container = segments.next().and_then(non_empty);
        let object = segments.next().and_then(non_empty);

        if object.is_some() && container.is_none() {
            return Err(VfsError::invalid_path(url, "object without container"));
        }

        Ok(Self {
            host: host.to_string(),
            account,
            container,
            object,
        })
    }

    /// Reference to the account itself
    pub fn account_ref(&self) -> Self {
        Self {
            host: self.host.clone(),
            account: self.account.clone(),
            container: None,
            object: None,
        }
    }

    pub const fn is_object(&self) -> bool {
        self.object.is_some()
    }

    fn tail(&self) -> String {
        let mut tail = self.account.clone();
        if let Some(container) = &self.container {
            tail.push('/');
            tail.push_str(container);
            if let Some(object) = &self.object {
                tail.push('/');
                tail.push_str(object);
            }
        }
        tail
    }

    /// `https://{host}/v1/{account}[/{container}[/{object}]]`
    pub fn http_url(&self) -> String {
        format!("https://{}/{API_VERSION}/{}", self.host, self.tail())
    }

    /// `swift://{host}/{account}[/{container}[/{object}]]`
    pub fn swift_url(&self) -> String {
        format!("{SWIFT_SCHEME}://{}/{}", self.host, self.tail())
    }

    /// HTTP URL of the account, used for container listings
    pub fn account_http_url(&self) -> String {
        format!("https://{}/{API_VERSION}/{}", self.host, self.account)
    }

    /// HTTP URL of the container, used for object listings
    pub fn container_http_url(&self) -> Option<String> {
        self.container
            .as_ref()
            .map(|c| format!("{}/{c}", self.account_http_url()))
    }

    /// Prefix that listing entry names are appended to
    ///
    /// `swift://{host}/{account}/` for accounts,
    /// `swift://{host}/{account}/{container}/` for containers.
    pub fn listing_prefix(&self) -> String {
        let mut prefix = format!("{SWIFT_SCHEME}://{}/{}/", self.host, self.account);
        if let Some(container) = &self.container {
            prefix.push_str(container);
            prefix.push('/');
        }
        prefix
    }
}

impl fmt::Display for SwiftRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.swift_url())
    }
}

impl std::str::FromStr for SwiftRef {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
