//! OpenStack SWIFT object storage as a swiftfs VFS backend
//!
//! ```no_run
//! use swiftfs_swift::{SwiftConfig, SwiftFileSystem};
//! use swiftfs_vfs::VfsBackend;
//!
//! # async fn demo() -> swiftfs_vfs::Result<()> {
//! let fs = SwiftFileSystem::new(SwiftConfig::load().with_env_auth());
//! for entry in fs.list("swift://swift.example.com/AUTH_project/images").await? {
//!     println!("{} {:?}", entry.name, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod filesystem;
pub mod listing;
pub mod reference;
pub mod session;
pub mod transport;

pub use auth::{headers_for, AuthEntry, AUTH_TOKEN_HEADER, ENV_AUTH_TOKEN, ENV_STORAGE_URL};
pub use config::{SwiftConfig, MAX_RETRIES};
pub use filesystem::{content_etag, SwiftFile, SwiftFileSystem, ETAG_KEY, MAX_UPLOAD_SIZE};
pub use reference::{SwiftRef, API_VERSION, SWIFT_SCHEME};
pub use session::{
    default_factory, fixed_factory, SessionFactory, SessionManager, SESSION_CLOSE_TIMEOUT,
};
pub use transport::{ClientOptions, HttpTransport, ReqwestTransport, SwiftRequest, SwiftResponse};
