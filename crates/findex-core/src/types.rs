//! Core data types for findex.
//!
//! A snapshot is a flat, ordered list of `(directory, file names)` records.
//! Only directories that directly contain files are kept, so there is no
//! tree to maintain and no parent pointers to keep consistent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// One directory of a snapshot and the names of the files directly in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Full directory path (e.g., "/home/me/docs")
    pub dir: String,

    /// File names without any path component, never empty
    pub files: Vec<String>,
}

impl DirEntry {
    /// Create a new entry
    pub fn new(dir: impl Into<String>, files: Vec<String>) -> Self {
        DirEntry {
            dir: dir.into(),
            files,
        }
    }

    /// Full path of one of this directory's files.
    pub fn join(&self, name: &str) -> String {
        Path::new(&self.dir).join(name).to_string_lossy().into_owned()
    }
}

/// Ordered directory records captured by a single traversal.
///
/// Traversal order is depth-first with parents before children, which is
/// also the order search results are reported in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    entries: Vec<DirEntry>,
}

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory record. Directories with no files are ignored.
    pub fn push(&mut self, dir: impl Into<String>, files: Vec<String>) {
        if !files.is_empty() {
            self.entries.push(DirEntry::new(dir, files));
        }
    }

    /// All directory records in traversal order
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Number of directory records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no directory holding files was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of file names across all records
    pub fn file_count(&self) -> u64 {
        self.entries.iter().map(|e| e.files.len() as u64).sum()
    }
}

/// A snapshot together with the metadata needed to judge its freshness.
///
/// `modified` is the root's modification time as observed when the build
/// started. It only ever changes through a full rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    /// Normalized root path
    pub root: String,

    /// Root modification time captured for this build
    pub modified: DateTime<Utc>,

    /// Wall clock time of the build
    pub indexed_at: DateTime<Utc>,

    /// Directories that could not be read and contributed nothing
    pub skipped_dirs: u64,

    /// The directory records
    pub snapshot: Snapshot,
}

impl StoredSnapshot {
    /// Summary counts for status reporting
    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            dirs: self.snapshot.len() as u64,
            files: self.snapshot.file_count(),
            skipped_dirs: self.skipped_dirs,
        }
    }

    /// True if the stored timestamp differs from the live one
    pub fn is_stale(&self, live_modified: DateTime<Utc>) -> bool {
        self.modified != live_modified
    }
}

/// Statistics about a stored snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    /// Directories holding at least one file
    pub dirs: u64,

    /// Total indexed file names
    pub files: u64,

    /// Directories skipped during the walk
    pub skipped_dirs: u64,
}

/// Normalize a root path for use as a cache address.
///
/// Relative roots are resolved against the current directory, `.` segments
/// are dropped and trailing separators are stripped, so one directory always
/// maps to one string. `..` is kept as written.
pub fn normalize_root(root: impl AsRef<Path>) -> String {
    let root = root.as_ref();
    let absolute = if root.is_absolute() {
        root.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(root),
            Err(_) => root.to_path_buf(),
        }
    };

    let cleaned: PathBuf = absolute.components().collect();
    let raw = cleaned.to_string_lossy();
    let trimmed = raw.trim_end_matches(|c| c == '/' || c == MAIN_SEPARATOR);
    if trimmed.is_empty() && !raw.is_empty() {
        MAIN_SEPARATOR.to_string()
    } else {
        trimmed.to_string()
    }
}
