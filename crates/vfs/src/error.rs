//! Error taxonomy shared by every VFS backend

use std::time::Duration;

/// Errors surfaced by filesystem operations.
#[derive(thiserror::Error, Debug)]
pub enum VfsError {
    #[error("unsupported url scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { scheme: String, url: String },

    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("file '{path}' not found")]
    NotFound { path: String },

    #[error("invalid target '{path}': {message}")]
    InvalidTarget { path: String, message: String },

    #[error("payload of {size} bytes exceeds the single request limit of {limit} bytes")]
    UnsupportedSize { size: u64, limit: u64 },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_target(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for `NotFound`
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status carried by the error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VfsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<tokio::task::JoinError> for VfsError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Runtime(e.to_string())
    }
}

/// Result alias used across the VFS layer
pub type Result<T, E = VfsError> = std::result::Result<T, E>;
