//! HTTP transport abstraction
//!
//! The filesystem talks to SWIFT through [`HttpTransport`] so tests can
//! substitute the network with an in-process server.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::{Deserialize, Serialize};
use swiftfs_vfs::{Result, VfsError};

/// Options for building the HTTP client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Whole-request timeout; none by default
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

/// A single request against the storage API
#[derive(Debug, Clone)]
pub struct SwiftRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl SwiftRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Merge `headers` into the request, replacing same-named headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Query parameter value, if set
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Response to a [`SwiftRequest`]
#[derive(Debug, Clone)]
pub struct SwiftResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl SwiftResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Turn a non-2xx response into [`VfsError::Status`]
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(VfsError::Status {
                status: self.status,
                url: url.to_string(),
            })
        }
    }
}

/// Network session used by the filesystem
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and collect the full response
    async fn execute(&self, request: SwiftRequest) -> Result<SwiftResponse>;

    /// Graceful shutdown
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Immediate teardown of pooled connections, without waiting
    fn abort(&self) {}
}

/// Production transport over `reqwest`
///
/// Closing or aborting drops the client and its connection pool. The next
/// request builds a fresh client, so a closed transport stays usable.
pub struct ReqwestTransport {
    options: ClientOptions,
    client: RwLock<Option<reqwest::Client>>,
}

fn build_client(options: &ClientOptions) -> Result<reqwest::Client> {
    let user_agent = options
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("swiftfs/{}", env!("CARGO_PKG_VERSION")));

    let mut builder = reqwest::Client::builder().user_agent(user_agent);
    if let Some(secs) = options.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = options.connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| VfsError::Transport(format!("failed to build HTTP client: {e}")))
}

impl ReqwestTransport {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let client = build_client(options)?;
        Ok(Self {
            options: options.clone(),
            client: RwLock::new(Some(client)),
        })
    }

    /// True while a client (and its connection pool) is held
    pub fn is_connected(&self) -> bool {
        self.client.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn client(&self) -> Result<reqwest::Client> {
        let mut slot = self
            .client
            .write()
            .map_err(|_| VfsError::Runtime("lock poisoned".to_string()))?;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = build_client(&self.options)?;
        tracing::debug!("HTTP client rebuilt after close");
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the client and with it the connection pool
    fn release(&self) -> bool {
        match self.client.write() {
            Ok(mut slot) => slot.take().is_some(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: SwiftRequest) -> Result<SwiftResponse> {
        let client = self.client()?;
        let method = request.method.clone();
        let url = request.url.clone();

        let mut builder = client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = builder.headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VfsError::Transport(format!("{method} {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            VfsError::Transport(format!("failed to read response body from {url}: {e}"))
        })?;

        tracing::debug!(%method, %url, status, "swift request");
        Ok(SwiftResponse { status, headers, body })
    }

    async fn close(&self) -> Result<()> {
        if self.release() {
            tracing::debug!("HTTP client closed");
        }
        Ok(())
    }

    fn abort(&self) {
        if self.release() {
            tracing::debug!("HTTP client aborted");
        }
    }
}
