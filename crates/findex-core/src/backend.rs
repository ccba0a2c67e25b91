//! Filesystem backend traits.
//!
//! The index store and search engine only talk to the filesystem through
//! [`FileSystemBackend`]. The shipped implementation is
//! [`LocalBackend`](crate::walk::LocalBackend); tests and embedders can swap
//! in their own to control what a walk returns or what timestamp a root
//! reports.

use crate::error::Result;
use crate::types::Snapshot;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// Output of a full walk of one root.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// Directory records in traversal order
    pub snapshot: Snapshot,

    /// Directories below the root that could not be read
    pub skipped_dirs: u64,
}

/// Abstract trait for filesystem backends.
///
/// ## Error Handling
///
/// Both methods must fail with `RootNotFound` or `NotADirectory` when the
/// root is unusable. Unreadable directories *below* the root are not errors:
/// they are counted in [`ScanOutput::skipped_dirs`] and contribute nothing.
pub trait FileSystemBackend: Send + Sync {
    /// Current modification time of the root directory.
    fn root_modified(&self, root: &Path) -> Result<DateTime<Utc>>;

    /// Walk the whole subtree below `root`.
    ///
    /// Only directories that directly contain at least one file are
    /// recorded. Order is depth-first, parents before children.
    fn scan(&self, root: &Path, progress: Option<Arc<dyn ScanProgress>>) -> Result<ScanOutput>;

    /// Get the backend name (e.g., "local")
    fn name(&self) -> &'static str;
}

/// Progress reporting for scan operations
pub trait ScanProgress: Send + Sync {
    /// Called periodically during scanning with the running counts
    fn on_progress(&self, dirs_scanned: u64, files_seen: u64);

    /// Called when scanning is complete
    fn on_complete(&self, total_dirs: u64, total_files: u64);
}

/// A simple progress reporter that logs to tracing
pub struct LoggingProgress {
    root: String,
}

impl LoggingProgress {
    pub fn new(root: impl Into<String>) -> Self {
        LoggingProgress { root: root.into() }
    }
}

impl ScanProgress for LoggingProgress {
    fn on_progress(&self, dirs_scanned: u64, files_seen: u64) {
        tracing::debug!(
            root = %self.root,
            dirs = dirs_scanned,
            files = files_seen,
            "Scanning progress"
        );
    }

    fn on_complete(&self, total_dirs: u64, total_files: u64) {
        tracing::info!(
            root = %self.root,
            dirs = total_dirs,
            files = total_files,
            "Scan complete"
        );
    }
}
