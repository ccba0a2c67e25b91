//! Recursive directory walk over the local filesystem.
//!
//! The walk uses an explicit stack instead of recursion. Children are pushed
//! in reverse name order so they are popped in ascending order, which gives a
//! depth-first, parent-before-children traversal that is identical between
//! two walks of an unchanged tree.
//!
//! Symbolic links to directories are listed neither as files nor followed.
//! Any other non-directory entry (including dangling links) counts as a file.

use crate::backend::{FileSystemBackend, ScanOutput, ScanProgress};
use crate::error::{FindexError, Result};
use crate::types::Snapshot;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Report progress every this many directories.
const PROGRESS_INTERVAL: u64 = 1_000;

/// Backend that reads the local filesystem with `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Create a new local backend.
    pub fn new() -> Self {
        LocalBackend
    }
}

impl FileSystemBackend for LocalBackend {
    fn root_modified(&self, root: &Path) -> Result<DateTime<Utc>> {
        let metadata = root_metadata(root)?;
        Ok(DateTime::from(metadata.modified()?))
    }

    fn scan(&self, root: &Path, progress: Option<Arc<dyn ScanProgress>>) -> Result<ScanOutput> {
        root_metadata(root)?;

        info!(root = %root.display(), "Starting directory walk");

        let mut snapshot = Snapshot::new();
        let mut skipped_dirs = 0u64;
        let mut dirs_scanned = 0u64;
        let mut files_seen = 0u64;

        let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if dir.as_path() == root => return Err(root_error(root, e)),
                Err(e) => {
                    if e.kind() == io::ErrorKind::PermissionDenied {
                        warn!(path = %dir.display(), "Permission denied, skipping directory");
                    } else {
                        debug!(path = %dir.display(), error = %e, "Failed to read directory");
                    }
                    skipped_dirs += 1;
                    continue;
                }
            };

            let mut files = Vec::new();
            let mut subdirs = Vec::new();

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!(path = %dir.display(), error = %e, "Failed to read entry");
                        continue;
                    }
                };

                let file_type = match entry.file_type() {
                    Ok(t) => t,
                    Err(e) => {
                        debug!(path = %entry.path().display(), error = %e, "Failed to stat entry");
                        continue;
                    }
                };

                if file_type.is_dir() {
                    subdirs.push(entry.path());
                } else if file_type.is_symlink() && entry.path().is_dir() {
                    // Linked directories are not descended into.
                    continue;
                } else {
                    files.push(entry.file_name().to_string_lossy().into_owned());
                }
            }

            files.sort_unstable();
            subdirs.sort_unstable();

            dirs_scanned += 1;
            files_seen += files.len() as u64;
            snapshot.push(dir.to_string_lossy(), files);
            stack.extend(subdirs.into_iter().rev());

            if let Some(ref p) = progress {
                if dirs_scanned % PROGRESS_INTERVAL == 0 {
                    p.on_progress(dirs_scanned, files_seen);
                }
            }
        }

        if let Some(ref p) = progress {
            p.on_complete(dirs_scanned, files_seen);
        }

        debug!(
            root = %root.display(),
            dirs = dirs_scanned,
            files = files_seen,
            skipped = skipped_dirs,
            "Directory walk finished"
        );

        Ok(ScanOutput {
            snapshot,
            skipped_dirs,
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Stat the root and make sure it is a directory.
fn root_metadata(root: &Path) -> Result<fs::Metadata> {
    let metadata = fs::metadata(root).map_err(|e| root_error(root, e))?;
    if !metadata.is_dir() {
        return Err(FindexError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(metadata)
}

fn root_error(root: &Path, err: io::Error) -> FindexError {
    match err.kind() {
        io::ErrorKind::NotFound => FindexError::RootNotFound {
            path: root.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => FindexError::PermissionDenied {
            operation: "read root".to_string(),
            path: root.to_path_buf(),
        },
        _ => FindexError::Io(err),
    }
}
