//! SWIFT backend for the VFS layer
//!
//! Every operation parses the path into a [`SwiftRef`], picks auth headers
//! for the target URL, and issues a single request on the shared session.
//!
//! Path format: `swift://{host}/{account}/{container}/{object}` or
//! `https://{host}/v1/{account}/{container}/{object}`

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{
    HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE,
};
use md5::{Digest, Md5};
use sha2::Sha256;
use swiftfs_vfs::{
    check_range, BlockingFs, BufferedFile, ChunkIo, FileInfo, OpenMode, Result, VfsBackend,
    VfsError,
};

use crate::auth::headers_for;
use crate::config::SwiftConfig;
use crate::listing::{translate, translate_all, translate_container};
use crate::reference::SwiftRef;
use crate::session::{default_factory, SessionFactory, SessionManager};
use crate::transport::{SwiftRequest, SwiftResponse};

/// Largest object a single PUT may carry (5 GiB)
pub const MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Key of the integrity tag in `stat` results
pub const ETAG_KEY: &str = "ETag";

/// Buffered file handle over a [`SwiftFileSystem`]
pub type SwiftFile = BufferedFile<SwiftFileSystem>;

/// `Range` header value for `start..end` (end exclusive)
fn range_header(start: Option<u64>, end: Option<u64>) -> Option<String> {
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("bytes={start}-{}", end - 1)),
        (Some(start), None) => Some(format!("bytes={start}-")),
        _ => None,
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| VfsError::Decode(format!("invalid header value '{value}': {e}")))
}

/// Hex MD5 of an upload body, the `ETag` SWIFT verifies on PUT
pub fn content_etag(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// OpenStack SWIFT filesystem
pub struct SwiftFileSystem {
    config: SwiftConfig,
    sessions: SessionManager,
    upload_limit: u64,
}

impl SwiftFileSystem {
    /// Create a filesystem talking to SWIFT over `reqwest`
    pub fn new(config: SwiftConfig) -> Self {
        Self::with_factory(config, default_factory())
    }

    /// Create a filesystem whose session comes from `factory`
    pub fn with_factory(config: SwiftConfig, factory: SessionFactory) -> Self {
        let sessions = SessionManager::new(factory, config.client.clone());
        Self {
            config,
            sessions,
            upload_limit: MAX_UPLOAD_SIZE,
        }
    }

    /// Defaults plus the token from the environment
    pub fn from_env() -> Self {
        Self::new(SwiftConfig::from_env())
    }

    /// Lower the single-upload ceiling below [`MAX_UPLOAD_SIZE`]
    #[must_use]
    pub fn with_upload_limit(mut self, limit: u64) -> Self {
        self.upload_limit = limit.min(MAX_UPLOAD_SIZE);
        self
    }

    pub const fn config(&self) -> &SwiftConfig {
        &self.config
    }

    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Wrap in a blocking adapter for synchronous callers
    pub fn blocking(self) -> Result<BlockingFs<Self>> {
        BlockingFs::new(self)
    }

    /// Open a buffered file handle
    ///
    /// Write handles keep everything in memory and upload it in one request
    /// on close.
    pub async fn open(self: &Arc<Self>, path: &str, mode: OpenMode) -> Result<SwiftFile> {
        BufferedFile::open(self.clone(), path, mode, self.config.block_size).await
    }

    fn auth_headers(&self, url: &str) -> HeaderMap {
        headers_for(url, &self.config.auth)
    }

    async fn send(&self, request: SwiftRequest) -> Result<SwiftResponse> {
        let session = self.sessions.get_session()?;
        session.execute(request).await
    }

    async fn get_listing(&self, path: &str, request: SwiftRequest) -> Result<Bytes> {
        let url = request.url.clone();
        let response = self.send(request).await?;
        if response.status == 404 {
            return Err(VfsError::not_found(path));
        }
        Ok(response.error_for_status(&url)?.body)
    }

    async fn list_account(&self, path: &str, reference: &SwiftRef) -> Result<Vec<FileInfo>> {
        let url = reference.account_http_url();
        let request = SwiftRequest::get(&url)
            .with_query("format", "json")
            .with_headers(self.auth_headers(&url));

        let body = self.get_listing(path, request).await?;
        translate_all(&body, &reference.listing_prefix(), translate_container)
    }

    async fn list_container(
        &self,
        path: &str,
        reference: &SwiftRef,
        url: String,
    ) -> Result<Vec<FileInfo>> {
        let prefix = match &reference.object {
            Some(object) if object.ends_with('/') => object.clone(),
            Some(object) => format!("{object}/"),
            None => String::new(),
        };
        let request = SwiftRequest::get(&url)
            .with_query("format", "json")
            .with_query("delimiter", "/")
            .with_query("prefix", prefix)
            .with_headers(self.auth_headers(&url));

        let body = self.get_listing(path, request).await?;
        translate_all(&body, &reference.listing_prefix(), translate)
    }
}

#[async_trait]
impl VfsBackend for SwiftFileSystem {
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let reference = SwiftRef::parse(path)?;
        match reference.container_http_url() {
            Some(url) => self.list_container(path, &reference, url).await,
            None => self.list_account(path, &reference).await,
        }
    }

    async fn read_range(&self, path: &str, start: Option<u64>, end: Option<u64>) -> Result<Bytes> {
        check_range(start, end)?;
        let reference = SwiftRef::parse(path)?;
        if !reference.is_object() {
            return Err(VfsError::invalid_target(path, "given path is not an object"));
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                return Ok(Bytes::new());
            }
        }

        let url = reference.http_url();
        let mut request = SwiftRequest::get(&url).with_headers(self.auth_headers(&url));
        if let Some(range) = range_header(start, end) {
            request = request.with_header(RANGE, header_value(&range)?);
        }

        let response = self.send(request).await?;
        if response.status == 404 {
            return Err(VfsError::not_found(reference.swift_url()));
        }
        let response = response.error_for_status(&url)?;

        // Full body despite a Range header: the server ignored it
        if response.status == 200 && start.is_some() {
            let len = response.body.len() as u64;
            let from = start.unwrap_or(0).min(len);
            let to = end.unwrap_or(len).clamp(from, len);
            return Ok(response.body.slice(from as usize..to as usize));
        }
        Ok(response.body)
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let reference = SwiftRef::parse(path)?;
        if !reference.is_object() {
            return Err(VfsError::invalid_target(path, "given path is not an object"));
        }
        let size = data.len() as u64;
        if size > self.upload_limit {
            return Err(VfsError::UnsupportedSize {
                size,
                limit: self.upload_limit,
            });
        }

        let url = reference.http_url();
        let mut request = SwiftRequest::put(&url)
            .with_headers(self.auth_headers(&url))
            .with_header(CONTENT_LENGTH, HeaderValue::from(size));
        if self.config.verify_uploads {
            request = request.with_header(ETAG, header_value(&content_etag(&data))?);
        }

        self.send(request.with_body(data))
            .await?
            .error_for_status(&url)?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let reference = SwiftRef::parse(path)?;
        if !reference.is_object() {
            return Err(VfsError::NotImplemented(
                "currently rm is only implemented for objects".to_string(),
            ));
        }

        let url = reference.http_url();
        let request = SwiftRequest::delete(&url).with_headers(self.auth_headers(&url));
        let response = self.send(request).await?;
        if response.status == 404 {
            return Err(VfsError::not_found(reference.swift_url()));
        }
        response.error_for_status(&url)?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let reference = SwiftRef::parse(path)?;
        if !reference.is_object() {
            return Ok(FileInfo::directory(reference.swift_url()));
        }

        let url = reference.http_url();
        let request = SwiftRequest::head(&url).with_headers(self.auth_headers(&url));
        let response = self.send(request).await?;
        if response.status != 200 {
            return Err(VfsError::not_found(reference.swift_url()));
        }

        let size = response
            .header(CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| VfsError::Decode(format!("missing Content-Length for {url}")))?;
        let mut info = FileInfo::file(reference.swift_url(), size);
        if let Some(etag) = response.header(ETAG.as_str()) {
            info = info.with_extra(ETAG_KEY, etag);
        }
        if let Some(content_type) = response.header(CONTENT_TYPE.as_str()) {
            info = info.with_extra("content_type", content_type);
        }
        if let Some(modified) = response.header(LAST_MODIFIED.as_str()) {
            info = info.with_extra("last_modified", modified);
        }
        Ok(info)
    }

    async fn unique_key(&self, path: &str) -> Result<String> {
        let info = self.stat(path).await?;
        if info.is_dir() {
            return Err(VfsError::invalid_target(path, "given path is not an object"));
        }
        let etag = info
            .extra_str(ETAG_KEY)
            .ok_or_else(|| VfsError::Decode(format!("no ETag reported for {path}")))?;

        let fingerprint = self.config.fingerprint();
        let mut hasher = Sha256::new();
        for part in [path, fingerprint.as_str(), etag] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    async fn close(&self) -> Result<()> {
        self.sessions.close().await;
        Ok(())
    }
}

#[async_trait]
impl ChunkIo for SwiftFileSystem {
    async fn fetch_range(&self, path: &str, start: u64, end: u64) -> Result<Bytes> {
        self.read_range(path, Some(start), Some(end)).await
    }

    async fn upload_chunk(&self, path: &str, data: Bytes, is_final: bool) -> Result<()> {
        if !is_final {
            return Err(VfsError::NotImplemented(
                "currently only single chunk uploads are implemented".to_string(),
            ));
        }
        self.write(path, data).await
    }

    async fn size_of(&self, path: &str) -> Result<u64> {
        self.stat(path)
            .await?
            .size
            .ok_or_else(|| VfsError::invalid_target(path, "given path is not an object"))
    }

    async fn prepare_write(&self, path: &str) -> Result<()> {
        if SwiftRef::parse(path)?.is_object() {
            Ok(())
        } else {
            Err(VfsError::invalid_target(path, "given path is not an object"))
        }
    }

    fn block_size(&self) -> usize {
        self.config.block_size
    }
}

impl Drop for SwiftFileSystem {
    fn drop(&mut self) {
        self.sessions.close_on_drop();
    }
}
