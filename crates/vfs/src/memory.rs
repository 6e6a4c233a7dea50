//! In-memory object store backend for testing
//!
//! Objects live in a flat key space under a root URL. Directories are not
//! stored; they exist wherever some key continues past a `/`, the same way
//! object stores infer pseudo-directories from key prefixes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::backend::{check_range, ChunkIo, FileInfo, VfsBackend};
use crate::error::{Result, VfsError};

/// In-memory filesystem backend
///
/// All data is stored in memory and lost when the backend is dropped.
/// Thread-safe via internal RwLock.
pub struct MemoryFs {
    root: String,
    objects: RwLock<BTreeMap<String, Bytes>>,
    /// Chunked uploads not yet finalized
    pending: RwLock<HashMap<String, Vec<u8>>>,
}

fn poisoned<T>(_: T) -> VfsError {
    VfsError::Runtime("lock poisoned".to_string())
}

impl MemoryFs {
    /// Create an empty store rooted at `root` (e.g. `mem://bucket`)
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(BTreeMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Create with initial objects, keyed relative to the root
    pub fn with_files(root: impl Into<String>, files: Vec<(&str, &[u8])>) -> Self {
        let fs = Self::new(root);
        if let Ok(mut objects) = fs.objects.write() {
            for (key, content) in files {
                objects.insert(format!("{}/{key}", fs.root), Bytes::copy_from_slice(content));
            }
        }
        fs
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// True when an object is stored at exactly `path`
    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .map(|objects| objects.contains_key(path))
            .unwrap_or(false)
    }

    /// Chunked uploads started but not yet finalized
    pub fn pending_uploads(&self) -> usize {
        self.pending.read().map(|pending| pending.len()).unwrap_or(0)
    }

    fn object_key<'a>(&self, path: &'a str) -> Result<&'a str> {
        let key = path.trim_end_matches('/');
        match key.strip_prefix(&self.root) {
            Some(rest) if rest.starts_with('/') && rest.len() > 1 => Ok(key),
            Some(_) => Err(VfsError::invalid_target(path, "path is not an object")),
            None => Err(VfsError::invalid_path(path, format!("outside of {}", self.root))),
        }
    }
}

#[async_trait]
impl VfsBackend for MemoryFs {
    async fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let dir = path.trim_end_matches('/');
        let prefix = format!("{dir}/");
        let objects = self.objects.read().map_err(poisoned)?;

        let mut files = Vec::new();
        let mut dirs = BTreeSet::new();
        for (key, data) in objects.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    dirs.insert(format!("{prefix}{child}"));
                }
                None => files.push(FileInfo::file(key.clone(), data.len() as u64)),
            }
        }

        if files.is_empty() && dirs.is_empty() && dir != self.root {
            return Err(VfsError::not_found(path));
        }

        let mut entries: Vec<FileInfo> = dirs.into_iter().map(FileInfo::directory).collect();
        entries.extend(files);
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_range(&self, path: &str, start: Option<u64>, end: Option<u64>) -> Result<Bytes> {
        check_range(start, end)?;
        let key = self.object_key(path)?;
        let objects = self.objects.read().map_err(poisoned)?;
        let data = objects.get(key).ok_or_else(|| VfsError::not_found(path))?;

        let len = data.len() as u64;
        let start = start.unwrap_or(0).min(len);
        let end = end.unwrap_or(len).clamp(start, len);
        Ok(data.slice(start as usize..end as usize))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let key = self.object_key(path)?.to_string();
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert(key, data);
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let key = self.object_key(path)?;
        let mut objects = self.objects.write().map_err(poisoned)?;
        match objects.remove(key) {
            Some(_) => Ok(()),
            None => Err(VfsError::not_found(path)),
        }
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let key = path.trim_end_matches('/');
        if key == self.root {
            return Ok(FileInfo::directory(key));
        }
        let objects = self.objects.read().map_err(poisoned)?;
        if let Some(data) = objects.get(key) {
            return Ok(FileInfo::file(key, data.len() as u64));
        }
        let prefix = format!("{key}/");
        if objects
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
        {
            return Ok(FileInfo::directory(key));
        }
        Err(VfsError::not_found(path))
    }

    async fn unique_key(&self, path: &str) -> Result<String> {
        let key = self.object_key(path)?;
        let objects = self.objects.read().map_err(poisoned)?;
        let data = objects.get(key).ok_or_else(|| VfsError::not_found(path))?;
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(data);
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl ChunkIo for MemoryFs {
    async fn fetch_range(&self, path: &str, start: u64, end: u64) -> Result<Bytes> {
        self.read_range(path, Some(start), Some(end)).await
    }

    async fn upload_chunk(&self, path: &str, data: Bytes, is_final: bool) -> Result<()> {
        let key = self.object_key(path)?.to_string();
        let assembled = {
            let mut pending = self.pending.write().map_err(poisoned)?;
            let buffer = pending.entry(key.clone()).or_default();
            buffer.extend_from_slice(&data);
            if !is_final {
                return Ok(());
            }
            pending.remove(&key).unwrap_or_default()
        };
        self.write(path, Bytes::from(assembled)).await
    }

    fn abandon_upload(&self, path: &str) {
        let Ok(key) = self.object_key(path) else {
            return;
        };
        if let Ok(mut pending) = self.pending.write() {
            pending.remove(key);
        }
    }

    async fn prepare_write(&self, path: &str) -> Result<()> {
        self.object_key(path).map(|_| ())
    }

    async fn size_of(&self, path: &str) -> Result<u64> {
        let info = self.stat(path).await?;
        info.size
            .ok_or_else(|| VfsError::invalid_target(path, "path is a directory"))
    }
}
