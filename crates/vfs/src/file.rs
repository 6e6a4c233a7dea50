//! Buffered file handles over a [`ChunkIo`] backend
//!
//! Reads are served from a single cached block fetched by byte range.
//! Writes accumulate in memory and are handed to the backend in chunks of
//! at least `block_size` bytes, plus one final chunk when the file is closed.

use std::io::SeekFrom;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::backend::ChunkIo;
use crate::error::{Result, VfsError};

/// Default block size for buffered reads and write chunks (5 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 5 * 1024 * 1024;

/// Mode a [`BufferedFile`] was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl FromStr for OpenMode {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" | "rb" => Ok(Self::Read),
            "w" | "wb" => Ok(Self::Write),
            other => Err(VfsError::NotImplemented(format!("open mode '{other}'"))),
        }
    }
}

/// Cached block of a file being read
struct Block {
    start: u64,
    data: Bytes,
}

impl Block {
    fn covers(&self, start: u64, end: u64) -> bool {
        start >= self.start && end <= self.start + self.data.len() as u64
    }
}

/// File handle bound to a backend
pub struct BufferedFile<C: ChunkIo + ?Sized> {
    io: Arc<C>,
    path: String,
    mode: OpenMode,
    block_size: usize,
    /// Total size when reading
    size: u64,
    /// Current position
    loc: u64,
    cache: Option<Block>,
    buffer: Vec<u8>,
    /// Bytes already handed to the backend when writing
    uploaded: u64,
    closed: bool,
}

impl<C: ChunkIo + ?Sized> BufferedFile<C> {
    /// Open `path`. Read mode asks the backend for the file size up front.
    pub async fn open(
        io: Arc<C>,
        path: impl Into<String>,
        mode: OpenMode,
        block_size: usize,
    ) -> Result<Self> {
        let path = path.into();
        let size = match mode {
            OpenMode::Read => io.size_of(&path).await?,
            OpenMode::Write => {
                io.prepare_write(&path).await?;
                0
            }
        };
        Ok(Self {
            io,
            path,
            mode,
            block_size: block_size.max(1),
            size,
            loc: 0,
            cache: None,
            buffer: Vec::new(),
            uploaded: 0,
            closed: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn mode(&self) -> OpenMode {
        self.mode
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Size of the file being read, or bytes written so far
    pub fn size(&self) -> u64 {
        match self.mode {
            OpenMode::Read => self.size,
            OpenMode::Write => self.uploaded + self.buffer.len() as u64,
        }
    }

    pub const fn tell(&self) -> u64 {
        self.loc
    }

    fn ensure_open(&self, wanted: OpenMode) -> Result<()> {
        if self.closed {
            return Err(VfsError::invalid_target(&self.path, "file is closed"));
        }
        if self.mode != wanted {
            let message = match wanted {
                OpenMode::Read => "file not opened for reading",
                OpenMode::Write => "file not opened for writing",
            };
            return Err(VfsError::invalid_target(&self.path, message));
        }
        Ok(())
    }

    /// Move the read position. Only available in read mode.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open(OpenMode::Read)?;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.loc.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
        };
        let target =
            target.ok_or_else(|| VfsError::invalid_path(&self.path, "seek before start of file"))?;
        self.loc = target;
        Ok(target)
    }

    /// Read up to `len` bytes, or everything left when `len` is `None`
    pub async fn read(&mut self, len: Option<usize>) -> Result<Bytes> {
        self.ensure_open(OpenMode::Read)?;
        let end = match len {
            Some(n) => self.loc.saturating_add(n as u64).min(self.size),
            None => self.size,
        };
        if self.loc >= end {
            return Ok(Bytes::new());
        }
        let data = self.fetch(self.loc, end).await?;
        self.loc = end;
        Ok(data)
    }

    async fn fetch(&mut self, start: u64, end: u64) -> Result<Bytes> {
        if let Some(block) = self.cache.as_ref().filter(|b| b.covers(start, end)) {
            let offset = (start - block.start) as usize;
            return Ok(block.data.slice(offset..offset + (end - start) as usize));
        }

        let block_end = end.max(start.saturating_add(self.block_size as u64).min(self.size));
        tracing::trace!(path = %self.path, start, end = block_end, "fetching block");
        let data = self.io.fetch_range(&self.path, start, block_end).await?;
        let wanted = ((end - start) as usize).min(data.len());
        let out = data.slice(..wanted);
        self.cache = Some(Block { start, data });
        Ok(out)
    }

    /// Buffer `data`; a chunk is uploaded once the buffer reaches the block size
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open(OpenMode::Write)?;
        self.buffer.extend_from_slice(data);
        self.loc += data.len() as u64;
        if self.buffer.len() >= self.block_size {
            self.flush(false).await?;
        }
        Ok(data.len())
    }

    /// Hand buffered data to the backend.
    ///
    /// Without `force` nothing happens until the buffer holds a full block.
    /// A forced flush is the final chunk.
    pub async fn flush(&mut self, force: bool) -> Result<()> {
        self.ensure_open(OpenMode::Write)?;
        if !force && self.buffer.len() < self.block_size {
            return Ok(());
        }

        let data = Bytes::from(std::mem::take(&mut self.buffer));
        let len = data.len() as u64;
        if let Err(e) = self.io.upload_chunk(&self.path, data.clone(), force).await {
            self.buffer = Vec::from(data);
            return Err(e);
        }
        self.uploaded += len;
        Ok(())
    }

    /// Finish the file. Write mode uploads the final chunk.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode == OpenMode::Write {
            self.flush(true).await?;
        }
        self.cache = None;
        self.closed = true;
        Ok(())
    }
}

impl<C: ChunkIo + ?Sized> Drop for BufferedFile<C> {
    fn drop(&mut self) {
        if self.mode == OpenMode::Write && !self.closed {
            tracing::warn!(
                path = %self.path,
                buffered = self.buffer.len(),
                "file opened for writing dropped without close, buffered data discarded"
            );
            if self.uploaded > 0 {
                self.io.abandon_upload(&self.path);
            }
        }
    }
}
