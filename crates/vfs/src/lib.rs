pub mod backend;
pub mod blocking;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::{check_range, ChunkIo, FileInfo, FileType, VfsBackend};
pub use blocking::{BlockingFile, BlockingFs, CLOSE_TIMEOUT};
pub use error::{Result, VfsError};
pub use file::{BufferedFile, OpenMode, DEFAULT_BLOCK_SIZE};
pub use memory::MemoryFs;
