//! Blocking adapter over an async [`VfsBackend`]
//!
//! Each call is spawned onto a runtime owned by the adapter and the calling
//! thread waits for it. With an operation timeout set, a wait that runs out
//! returns [`VfsError::Timeout`] but the spawned operation keeps running to
//! completion in the background.

use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::backend::{ChunkIo, FileInfo, VfsBackend};
use crate::error::{Result, VfsError};
use crate::file::{BufferedFile, OpenMode};

/// How long `close` waits for the backend to release its resources
pub const CLOSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Synchronous facade for callers outside an async context
pub struct BlockingFs<B: VfsBackend + 'static> {
    backend: Arc<B>,
    runtime: Option<Runtime>,
    timeout: Option<Duration>,
}

impl<B: VfsBackend + 'static> BlockingFs<B> {
    /// Wrap `backend`, starting a dedicated single-worker runtime
    pub fn new(backend: B) -> Result<Self> {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<B>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("swiftfs-io")
            .enable_all()
            .build()
            .map_err(|e| VfsError::Runtime(format!("failed to start runtime: {e}")))?;

        Ok(Self {
            backend,
            runtime: Some(runtime),
            timeout: None,
        })
    }

    /// Give up waiting on operations after `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The wrapped async backend
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Handle to the adapter's runtime, for driving async work on it directly
    pub fn handle(&self) -> Option<&Handle> {
        self.runtime.as_ref().map(Runtime::handle)
    }

    /// Run `op` on the adapter's runtime and block until it finishes
    pub fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<B>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_timeout(self.timeout, op)
    }

    fn run_with_timeout<T, F, Fut>(&self, timeout: Option<Duration>, op: F) -> Result<T>
    where
        F: FnOnce(Arc<B>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        ensure_sync_context()?;
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| VfsError::Runtime("runtime already shut down".to_string()))?;

        let task = runtime.spawn(op(self.backend.clone()));
        runtime.block_on(async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, task)
                    .await
                    .map_err(|_| VfsError::Timeout(limit))??,
                None => task.await?,
            }
        })
    }

    pub fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.list(&path).await })
    }

    pub fn list_names(&self, path: &str) -> Result<Vec<String>> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.list_names(&path).await })
    }

    pub fn read(&self, path: &str) -> Result<Bytes> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.read(&path).await })
    }

    pub fn read_range(&self, path: &str, start: Option<u64>, end: Option<u64>) -> Result<Bytes> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.read_range(&path, start, end).await })
    }

    pub fn write(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let path = path.to_string();
        let data = data.into();
        self.run(move |fs| async move { fs.write(&path, data).await })
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.remove_file(&path).await })
    }

    pub fn stat(&self, path: &str) -> Result<FileInfo> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.stat(&path).await })
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.exists(&path).await })
    }

    pub fn is_file(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.is_file(&path).await })
    }

    pub fn is_dir(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.is_dir(&path).await })
    }

    pub fn unique_key(&self, path: &str) -> Result<String> {
        let path = path.to_string();
        self.run(move |fs| async move { fs.unique_key(&path).await })
    }

    /// Release backend resources, waiting at most [`CLOSE_TIMEOUT`]
    pub fn close(&self) -> Result<()> {
        self.run_with_timeout(Some(CLOSE_TIMEOUT), |fs| async move { fs.close().await })
    }
}

impl<B: VfsBackend + ChunkIo + 'static> BlockingFs<B> {
    /// Open a buffered file handle driven by the adapter's runtime
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<BlockingFile<B>> {
        ensure_sync_context()?;
        let handle = self
            .handle()
            .cloned()
            .ok_or_else(|| VfsError::Runtime("runtime already shut down".to_string()))?;
        let block_size = self.backend.block_size();
        let open = BufferedFile::open(self.backend.clone(), path, mode, block_size);
        let file = handle.block_on(open)?;
        Ok(BlockingFile { file, handle })
    }
}

impl<B: VfsBackend + 'static> Drop for BlockingFs<B> {
    fn drop(&mut self) {
        if Handle::try_current().is_err() {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "backend close failed during drop");
            }
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn ensure_sync_context() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(VfsError::Runtime(
            "blocking filesystem call made from inside an async context".to_string(),
        ));
    }
    Ok(())
}

/// Synchronous [`BufferedFile`]
///
/// Futures run on the calling thread while the adapter's runtime drives
/// I/O. The handle must not outlive the [`BlockingFs`] it came from.
pub struct BlockingFile<C: ChunkIo + 'static> {
    file: BufferedFile<C>,
    handle: Handle,
}

impl<C: ChunkIo + 'static> BlockingFile<C> {
    pub fn path(&self) -> &str {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn tell(&self) -> u64 {
        self.file.tell()
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file.seek(pos)
    }

    pub fn read(&mut self, len: Option<usize>) -> Result<Bytes> {
        ensure_sync_context()?;
        self.handle.block_on(self.file.read(len))
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        ensure_sync_context()?;
        self.handle.block_on(self.file.write(data))
    }

    pub fn flush(&mut self) -> Result<()> {
        ensure_sync_context()?;
        self.handle.block_on(self.file.flush(false))
    }

    pub fn close(&mut self) -> Result<()> {
        ensure_sync_context()?;
        self.handle.block_on(self.file.close())
    }
}

impl<C: ChunkIo + 'static> Drop for BlockingFile<C> {
    fn drop(&mut self) {
        if self.file.is_closed() || Handle::try_current().is_ok() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.file.path(), error = %e, "closing file during drop failed");
        }
    }
}
