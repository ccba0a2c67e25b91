//! Persistence layer for per-root snapshots.
//!
//! Every indexed root gets its own entry file inside the cache directory,
//! named after the root's cache key. Entries are private to this module and
//! carry a format version; anything that does not decode cleanly is treated
//! the same as a missing entry by the search engine.
//!
//! ## Entry File Format
//!
//! ```text
//! [Header: 32 bytes]
//!   - Magic: "FDEX" (4 bytes)
//!   - Version: u32 (4 bytes)
//!   - Flags: u32 (4 bytes) - compression
//!   - File count: u64 (8 bytes)
//!   - Reserved: 12 bytes
//!
//! [Payload: variable]
//!   - bincode(StoredSnapshot), LZ4 compressed when flagged
//!
//! [Footer: 8 bytes]
//!   - CRC32 checksum of payload: u32
//!   - Magic: "XEDF" (4 bytes)
//! ```

use crate::backend::{FileSystemBackend, ScanProgress};
use crate::error::{FindexError, Result};
use crate::types::{normalize_root, SnapshotStats, StoredSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Magic bytes at the start of entry files
pub const MAGIC_HEADER: &[u8; 4] = b"FDEX";
/// Magic bytes at the end of entry files (reversed)
pub const MAGIC_FOOTER: &[u8; 4] = b"XEDF";
/// Current entry format version
pub const ENTRY_VERSION: u32 = 1;
/// File extension of cache entries
pub const ENTRY_EXTENSION: &str = "fdx";

const HEADER_LEN: usize = 32;
const FOOTER_LEN: usize = 8;

/// Flags for the entry file format
#[derive(Debug, Clone, Copy)]
pub struct EntryFlags(u32);

impl EntryFlags {
    /// No compression
    pub const NONE: Self = EntryFlags(0);
    /// LZ4 compression
    pub const COMPRESSED_LZ4: Self = EntryFlags(1);

    fn is_compressed(&self) -> bool {
        self.0 & 1 != 0
    }
}

/// Header structure for an entry file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHeader {
    magic: [u8; 4],
    version: u32,
    flags: u32,
    file_count: u64,
    reserved: [u8; 12],
}

impl EntryHeader {
    fn new(file_count: u64, flags: EntryFlags) -> Self {
        EntryHeader {
            magic: *MAGIC_HEADER,
            version: ENTRY_VERSION,
            flags: flags.0,
            file_count,
            reserved: [0; 12],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.magic != *MAGIC_HEADER {
            return Err(FindexError::corrupt("invalid magic bytes in header"));
        }
        if self.version != ENTRY_VERSION {
            return Err(FindexError::CacheVersionMismatch {
                found: self.version,
                expected: ENTRY_VERSION,
            });
        }
        Ok(())
    }
}

/// Derive the cache key for a root.
///
/// The root is normalized, split into components, and every byte of a
/// component other than ASCII alphanumerics, `-` and `.` is percent-escaped.
/// Components are then joined with `_`, which never occurs unescaped inside a
/// component, so distinct roots always produce distinct keys.
pub fn cache_key(root: impl AsRef<Path>) -> String {
    normalize_root(root)
        .split(|c| c == '/' || c == MAIN_SEPARATOR)
        .map(escape_component)
        .collect::<Vec<_>>()
        .join("_")
}

fn escape_component(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for byte in component.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{:02X}", byte);
        }
    }
    escaped
}

/// Result of a full build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The freshly built snapshot and its metadata
    pub stored: StoredSnapshot,

    /// Whether the entry reached disk
    pub persisted: bool,

    /// Why persisting failed, if it did
    pub write_error: Option<String>,

    /// Time spent walking and writing
    pub elapsed: Duration,
}

/// Summary of one persisted entry, for status reporting.
#[derive(Debug, Clone)]
pub struct EntrySummary {
    /// Entry file location
    pub path: PathBuf,

    /// Root the entry belongs to
    pub root: String,

    /// Root modification time recorded at build
    pub modified: DateTime<Utc>,

    /// When the entry was built
    pub indexed_at: DateTime<Utc>,

    /// Record counts
    pub stats: SnapshotStats,
}

impl From<(&Path, &StoredSnapshot)> for EntrySummary {
    fn from((path, stored): (&Path, &StoredSnapshot)) -> Self {
        EntrySummary {
            path: path.to_path_buf(),
            root: stored.root.clone(),
            modified: stored.modified,
            indexed_at: stored.indexed_at,
            stats: stored.stats(),
        }
    }
}

/// Outcome of [`IndexStore::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    /// Entries deleted
    pub removed: usize,

    /// Entries that could not be deleted (logged)
    pub failed: usize,
}

/// Durable cache of snapshots, one entry per root.
///
/// ## Example
///
/// ```rust,ignore
/// use findex_core::{IndexStore, LocalBackend};
///
/// let store = IndexStore::new("./cache");
/// let outcome = store.build(&LocalBackend::new(), "/home/me", None)?;
/// let stored = store.load("/home/me")?;
/// assert_eq!(stored.snapshot, outcome.stored.snapshot);
/// ```
pub struct IndexStore {
    /// Directory holding the entry files
    base_dir: PathBuf,

    /// Whether to use compression
    use_compression: bool,
}

impl IndexStore {
    /// Create a new IndexStore with the given base directory.
    ///
    /// The directory is created on first write.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        IndexStore {
            base_dir: base_dir.as_ref().to_path_buf(),
            use_compression: true,
        }
    }

    /// Set whether to use compression when saving.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.use_compression = compress;
        self
    }

    /// Directory holding the entry files
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the entry file for a root.
    pub fn entry_path(&self, root: impl AsRef<Path>) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", cache_key(root), ENTRY_EXTENSION))
    }

    fn temp_path(&self, root: impl AsRef<Path>) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}.tmp", cache_key(root), ENTRY_EXTENSION))
    }

    /// Check if an entry exists for a root.
    pub fn exists(&self, root: impl AsRef<Path>) -> bool {
        self.entry_path(root).exists()
    }

    /// Walk `root` and persist a fresh entry, replacing any previous one.
    ///
    /// The root's modification time is read before the walk starts. If the
    /// tree changes while it is being walked, the stored timestamp is older
    /// than the live one and the next search sees the entry as stale.
    ///
    /// A failed write does not fail the build: the outcome carries the
    /// snapshot with `persisted == false`.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn build(
        &self,
        backend: &dyn FileSystemBackend,
        root: impl AsRef<Path>,
        progress: Option<Arc<dyn ScanProgress>>,
    ) -> Result<BuildOutcome> {
        let start = Instant::now();
        let root = normalize_root(root);
        let root_path = Path::new(&root);

        let modified = backend.root_modified(root_path)?;
        let scan = backend.scan(root_path, progress)?;

        let stored = StoredSnapshot {
            root: root.clone(),
            modified,
            indexed_at: Utc::now(),
            skipped_dirs: scan.skipped_dirs,
            snapshot: scan.snapshot,
        };

        let stats = stored.stats();
        info!(
            root = %root,
            backend = backend.name(),
            dirs = stats.dirs,
            files = stats.files,
            skipped = stats.skipped_dirs,
            "Snapshot built"
        );

        let (persisted, write_error) = match self.save(&stored) {
            Ok(_) => (true, None),
            Err(e) => {
                warn!(root = %root, error = %e, "Snapshot not persisted, using it in memory only");
                (false, Some(e.to_string()))
            }
        };

        Ok(BuildOutcome {
            stored,
            persisted,
            write_error,
            elapsed: start.elapsed(),
        })
    }

    /// Save a snapshot under its root's key.
    ///
    /// Uses atomic write (write to temp, then rename) to prevent corruption.
    pub fn save(&self, stored: &StoredSnapshot) -> Result<PathBuf> {
        let path = self.entry_path(&stored.root);
        let temp_path = self.temp_path(&stored.root);

        self.write_entry(&path, &temp_path, stored)
            .map_err(|e| FindexError::CacheWriteFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), "Snapshot entry saved");
        Ok(path)
    }

    fn write_entry(&self, path: &Path, temp_path: &Path, stored: &StoredSnapshot) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;

        let payload = bincode::serialize(stored)?;
        let (flags, data) = if self.use_compression {
            (EntryFlags::COMPRESSED_LZ4, lz4_flex::compress_prepend_size(&payload))
        } else {
            (EntryFlags::NONE, payload)
        };

        {
            let file = File::create(temp_path)?;
            let mut writer = BufWriter::new(file);

            let header = EntryHeader::new(stored.snapshot.file_count(), flags);
            writer.write_all(&bincode::serialize(&header)?)?;
            writer.write_all(&data)?;

            let checksum = crc32fast::hash(&data);
            writer.write_all(&checksum.to_le_bytes())?;
            writer.write_all(MAGIC_FOOTER)?;

            writer.flush()?;
        }

        if let Err(e) = fs::rename(temp_path, path) {
            let _ = fs::remove_file(temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Load the entry for a root.
    ///
    /// Fails with `CacheNotFound` if there is none; `CacheCorrupt` and
    /// `CacheVersionMismatch` mean the entry exists but must be rebuilt.
    /// Staleness is not checked here.
    pub fn load(&self, root: impl AsRef<Path>) -> Result<StoredSnapshot> {
        let root = normalize_root(root);
        let path = self.entry_path(&root);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FindexError::CacheNotFound { root });
            }
            Err(e) => return Err(e.into()),
        };

        let stored = decode_entry(&bytes)?;
        if stored.root != root {
            return Err(FindexError::corrupt(format!(
                "entry belongs to {}, not {}",
                stored.root, root
            )));
        }

        debug!(
            path = %path.display(),
            dirs = stored.snapshot.len(),
            "Snapshot entry loaded"
        );
        Ok(stored)
    }

    /// Summaries of every readable entry in the cache directory.
    ///
    /// Unreadable entries are logged and left out.
    pub fn entries(&self) -> Result<Vec<EntrySummary>> {
        let dir = match fs::read_dir(&self.base_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match fs::read(&path).map_err(FindexError::from).and_then(|b| decode_entry(&b)) {
                Ok(stored) => summaries.push(EntrySummary::from((path.as_path(), &stored))),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }

        summaries.sort_by(|a, b| a.root.cmp(&b.root));
        Ok(summaries)
    }

    /// Delete every persisted entry.
    ///
    /// Never fails: problems are logged and counted in the summary.
    pub fn clear_all(&self) -> ClearSummary {
        let mut summary = ClearSummary::default();

        let dir = match fs::read_dir(&self.base_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return summary,
            Err(e) => {
                warn!(path = %self.base_dir.display(), error = %e, "Cannot list cache directory");
                summary.failed += 1;
                return summary;
            }
        };

        for entry in dir.flatten() {
            let path = entry.path();
            if !is_entry_file(&path) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => summary.removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to delete cache entry");
                    summary.failed += 1;
                }
            }
        }

        info!(
            removed = summary.removed,
            failed = summary.failed,
            "Cleared cache entries"
        );
        summary
    }
}

fn is_entry_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let suffix = format!(".{}", ENTRY_EXTENSION);
    let temp_suffix = format!(".{}.tmp", ENTRY_EXTENSION);
    name.ends_with(&suffix) || name.ends_with(&temp_suffix)
}

fn decode_entry(bytes: &[u8]) -> Result<StoredSnapshot> {
    if bytes.len() < HEADER_LEN + FOOTER_LEN {
        return Err(FindexError::corrupt("entry file is truncated"));
    }

    let header: EntryHeader = bincode::deserialize(&bytes[..HEADER_LEN])
        .map_err(|e| FindexError::corrupt(format!("header deserialization failed: {}", e)))?;
    header.validate()?;
    let flags = EntryFlags(header.flags);

    let data = &bytes[HEADER_LEN..bytes.len() - FOOTER_LEN];
    let footer = &bytes[bytes.len() - FOOTER_LEN..];

    if &footer[4..8] != MAGIC_FOOTER {
        return Err(FindexError::corrupt("invalid footer magic bytes"));
    }

    let stored_checksum = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let computed_checksum = crc32fast::hash(data);
    if stored_checksum != computed_checksum {
        return Err(FindexError::corrupt(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            stored_checksum, computed_checksum
        )));
    }

    let payload = if flags.is_compressed() {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| FindexError::corrupt(format!("decompression failed: {}", e)))?
    } else {
        data.to_vec()
    };

    bincode::deserialize(&payload)
        .map_err(|e| FindexError::corrupt(format!("deserialization failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Snapshot;
    use crate::walk::LocalBackend;
    use tempfile::TempDir;

    fn make_stored(root: &str) -> StoredSnapshot {
        let mut snapshot = Snapshot::new();
        snapshot.push(root, vec!["a.txt".to_string(), "b.rs".to_string()]);
        snapshot.push(format!("{}/sub", root), vec!["c.md".to_string()]);
        StoredSnapshot {
            root: root.to_string(),
            modified: Utc::now(),
            indexed_at: Utc::now(),
            skipped_dirs: 0,
            snapshot,
        }
    }

    #[test]
    fn test_header_is_fixed_size() {
        let header = EntryHeader::new(42, EntryFlags::NONE);
        assert_eq!(bincode::serialize(&header).unwrap().len(), HEADER_LEN);
    }

    #[test]
    fn test_cache_key_is_stable_and_distinct() {
        assert_eq!(cache_key("/home/me"), cache_key("/home/me/"));
        assert_eq!(cache_key("/home/me"), "_home_me");

        // Plain separator replacement would map these two to the same key.
        assert_ne!(cache_key("/a_b"), cache_key("/a/b"));
        assert_ne!(cache_key("/a%5Fb"), cache_key("/a_b"));
        assert_ne!(cache_key("/a b"), cache_key("/a/b"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());

        let stored = make_stored("/data/photos");
        store.save(&stored).unwrap();
        assert!(store.exists("/data/photos"));
        assert!(store.exists("/data/photos/"));

        let loaded = store.load("/data/photos/").unwrap();
        assert_eq!(loaded.snapshot, stored.snapshot);
        assert_eq!(loaded.modified, stored.modified);
        assert_eq!(loaded.root, "/data/photos");
    }

    #[test]
    fn test_save_and_load_uncompressed() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path()).with_compression(false);

        let stored = make_stored("/data");
        store.save(&stored).unwrap();
        let loaded = store.load("/data").unwrap();
        assert_eq!(loaded.snapshot, stored.snapshot);
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());

        let result = store.load("/nowhere");
        assert!(matches!(result, Err(FindexError::CacheNotFound { .. })));
    }

    #[test]
    fn test_corrupted_entry() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        fs::write(store.entry_path("/data"), b"not a valid entry file, not at all").unwrap();

        let err = store.load("/data").unwrap_err();
        assert!(err.requires_rebuild(), "unexpected error: {err}");
    }

    #[test]
    fn test_flipped_payload_byte_fails_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        let path = store.save(&make_stored("/data")).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_LEN + 1] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.load("/data"),
            Err(FindexError::CacheCorrupt { .. })
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());
        let path = store.save(&make_stored("/data")).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[4..8].copy_from_slice(&(ENTRY_VERSION + 1).to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let err = store.load("/data").unwrap_err();
        assert!(matches!(err, FindexError::CacheVersionMismatch { .. }));
        assert!(err.requires_rebuild());
    }

    #[test]
    fn test_build_persists_and_is_idempotent() {
        let tree = TempDir::new().unwrap();
        fs::create_dir_all(tree.path().join("docs")).unwrap();
        fs::write(tree.path().join("docs/report.txt"), b"").unwrap();
        fs::write(tree.path().join("notes.md"), b"").unwrap();

        let cache = TempDir::new().unwrap();
        let store = IndexStore::new(cache.path());
        let backend = LocalBackend::new();

        let first = store.build(&backend, tree.path(), None).unwrap();
        assert!(first.persisted);
        assert_eq!(first.stored.stats().files, 2);

        let second = store.build(&backend, tree.path(), None).unwrap();
        assert_eq!(first.stored.snapshot, second.stored.snapshot);
        assert_eq!(first.stored.modified, second.stored.modified);

        let loaded = store.load(tree.path()).unwrap();
        assert_eq!(loaded.snapshot, second.stored.snapshot);
    }

    #[test]
    fn test_build_missing_root() {
        let cache = TempDir::new().unwrap();
        let store = IndexStore::new(cache.path());
        let missing = cache.path().join("missing");

        let result = store.build(&LocalBackend::new(), &missing, None);
        assert!(matches!(result, Err(FindexError::RootNotFound { .. })));
        assert!(!store.exists(&missing));
    }

    #[test]
    fn test_build_survives_write_failure() {
        let tree = TempDir::new().unwrap();
        fs::write(tree.path().join("file.txt"), b"").unwrap();

        // A regular file where the cache directory should be.
        let cache = TempDir::new().unwrap();
        let blocker = cache.path().join("blocked");
        fs::write(&blocker, b"").unwrap();
        let store = IndexStore::new(&blocker);

        let outcome = store.build(&LocalBackend::new(), tree.path(), None).unwrap();
        assert!(!outcome.persisted);
        assert!(outcome.write_error.is_some());
        assert_eq!(outcome.stored.stats().files, 1);
    }

    #[test]
    fn test_entries_and_clear_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path());

        store.save(&make_stored("/one")).unwrap();
        store.save(&make_stored("/two")).unwrap();
        fs::write(temp_dir.path().join("unrelated.txt"), b"keep").unwrap();

        let entries = store.entries().unwrap();
        let roots: Vec<_> = entries.iter().map(|e| e.root.as_str()).collect();
        assert_eq!(roots, vec!["/one", "/two"]);
        assert_eq!(entries[0].stats.files, 3);

        let summary = store.clear_all();
        assert_eq!(summary, ClearSummary { removed: 2, failed: 0 });
        assert!(!store.exists("/one"));
        assert!(temp_dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_clear_all_without_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = IndexStore::new(temp_dir.path().join("never-created"));
        assert_eq!(store.clear_all(), ClearSummary::default());
    }
}
