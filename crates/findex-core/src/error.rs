//! Error types for findex core operations.
//!
//! Library code returns [`FindexError`] so callers can tell a bad root apart
//! from a cache entry that merely needs rebuilding. The CLI wraps these in
//! `anyhow` for reporting.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using FindexError
pub type Result<T> = std::result::Result<T, FindexError>;

/// Core error types for findex operations.
#[derive(Error, Debug)]
pub enum FindexError {
    // === Root Errors ===
    /// The search root does not exist (or vanished before the walk started)
    #[error("root not found: {path}")]
    RootNotFound { path: PathBuf },

    /// The search root exists but is not a directory
    #[error("root is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Permission denied when reading part of the filesystem
    #[error("permission denied: {operation} on {path}")]
    PermissionDenied { operation: String, path: PathBuf },

    // === Cache Errors ===
    /// No cache entry exists for the root
    #[error("no cached index for {root}")]
    CacheNotFound { root: String },

    /// The cache entry exists but could not be decoded
    #[error("cache entry is corrupted: {reason}")]
    CacheCorrupt { reason: String },

    /// The cache entry was written by a different format version
    #[error("cache version mismatch: found {found}, expected {expected}")]
    CacheVersionMismatch { found: u32, expected: u32 },

    /// Writing the cache entry failed; the in-memory snapshot is still valid
    #[error("failed to write cache entry {path}: {reason}")]
    CacheWriteFailed { path: PathBuf, reason: String },

    // === Search Errors ===
    /// An exclusion rule could not be compiled
    #[error("invalid search pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FindexError {
    /// Returns true if this error means the cache entry should be rebuilt
    /// rather than reported.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            FindexError::CacheNotFound { .. }
                | FindexError::CacheCorrupt { .. }
                | FindexError::CacheVersionMismatch { .. }
        )
    }

    /// Returns true if the requested root itself is unusable.
    pub fn is_root_error(&self) -> bool {
        matches!(
            self,
            FindexError::RootNotFound { .. } | FindexError::NotADirectory { .. }
        )
    }

    /// Create a corruption error
    pub fn corrupt(reason: impl Into<String>) -> Self {
        FindexError::CacheCorrupt {
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for FindexError {
    fn from(err: bincode::Error) -> Self {
        FindexError::Serialization(err.to_string())
    }
}
