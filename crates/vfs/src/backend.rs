use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VfsError};
use crate::file::DEFAULT_BLOCK_SIZE;

/// Kind of entry reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

/// Entry metadata returned by `list` and `stat`
///
/// Serializes flat: backend specific metadata in `extra` sits next to
/// `name`, `size` and `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Fully qualified path of the entry
    pub name: String,
    /// Byte count, always `None` for directories
    pub size: Option<u64>,
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Passthrough metadata (hashes, timestamps, content types)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FileInfo {
    /// Create a file entry
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
            file_type: FileType::File,
            extra: BTreeMap::new(),
        }
    }

    /// Create a directory entry
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            file_type: FileType::Directory,
            extra: BTreeMap::new(),
        }
    }

    /// Attach a passthrough metadata field
    #[must_use]
    pub fn with_extra(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// String valued passthrough field
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_json::Value::as_str)
    }
}

/// VFS backend trait - all file operations go through this
///
/// Paths are full backend URLs and are never shortened or normalized by
/// the VFS layer. Default implementations derive the convenience queries
/// from the required operations.
#[async_trait]
pub trait VfsBackend: Send + Sync {
    /// List a directory with full entry records
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>>;

    /// Read `start..end` of a file (`end` exclusive); `None` bounds mean
    /// "from the beginning" and "to the end"
    async fn read_range(&self, path: &str, start: Option<u64>, end: Option<u64>) -> Result<Bytes>;

    /// Write entire file contents (create or overwrite)
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    /// Remove a file
    async fn remove_file(&self, path: &str) -> Result<()>;

    /// Get file/directory metadata
    async fn stat(&self, path: &str) -> Result<FileInfo>;

    /// Key that changes whenever the content behind `path` changes
    async fn unique_key(&self, path: &str) -> Result<String>;

    // ─────────────────────────────────────────────────────────────────────────
    // Derived operations
    // ─────────────────────────────────────────────────────────────────────────

    /// List a directory, names only
    async fn list_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .list(path)
            .await?
            .into_iter()
            .map(|info| info.name)
            .collect())
    }

    /// Read entire file contents
    async fn read(&self, path: &str) -> Result<Bytes> {
        self.read_range(path, None, None).await
    }

    /// Check if a file or directory exists
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn is_file(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(info) => Ok(info.is_file()),
            Err(_) => Ok(false),
        }
    }

    async fn is_dir(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(info) => Ok(info.is_dir()),
            Err(_) => Ok(false),
        }
    }

    /// Release network sessions and other held resources
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Byte-range and chunk-upload hooks used by [`crate::BufferedFile`]
#[async_trait]
pub trait ChunkIo: Send + Sync {
    /// Fetch `start..end` (end exclusive) of the file at `path`
    async fn fetch_range(&self, path: &str, start: u64, end: u64) -> Result<Bytes>;

    /// Upload buffered data. `is_final` is set only when the file is closed.
    async fn upload_chunk(&self, path: &str, data: Bytes, is_final: bool) -> Result<()>;

    /// Size of the file at `path`, used when opening for reading
    async fn size_of(&self, path: &str) -> Result<u64>;

    /// Discard partial upload state of a write handle dropped before close
    fn abandon_upload(&self, _path: &str) {}

    /// Reject write handles for paths that can never hold a file
    async fn prepare_write(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    /// Block size for handles opened without an explicit one
    fn block_size(&self) -> usize {
        DEFAULT_BLOCK_SIZE
    }
}

/// Reject an `end` bound with no `start`.
///
/// Backends share this check so "first N bytes" reads fail the same way
/// everywhere.
pub fn check_range(start: Option<u64>, end: Option<u64>) -> Result<()> {
    if start.is_none() && end.is_some() {
        return Err(VfsError::NotImplemented(
            "range reads need a start offset when an end offset is given".to_string(),
        ));
    }
    Ok(())
}
