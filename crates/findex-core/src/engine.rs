//! Snapshot resolution and search orchestration.
//!
//! A search goes through two steps:
//!
//! 1. **Resolve** a snapshot for the root. A previous session's snapshot is
//!    reused when it belongs to the same root and is still fresh; otherwise
//!    the store is consulted. A missing or unreadable entry triggers a build.
//!    A stale entry is handed to a [`RebuildPolicy`], which decides between
//!    rebuilding and searching the stale data.
//! 2. **Scan** the snapshot with the compiled query.
//!
//! The engine itself holds no per-search state. Each call returns a new
//! [`Session`] that the caller passes back into the next call.

use crate::backend::{FileSystemBackend, LoggingProgress, ScanProgress};
use crate::config::Config;
use crate::error::{FindexError, Result};
use crate::persistence::{BuildOutcome, EntrySummary, IndexStore};
use crate::search::{Scanner, SearchQuery, SearchResults};
use crate::types::{normalize_root, StoredSnapshot};
use crate::walk::LocalBackend;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Details handed to a [`RebuildPolicy`] when a cached snapshot is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    /// Normalized root
    pub root: String,

    /// Root modification time recorded in the snapshot
    pub stored: DateTime<Utc>,

    /// Root modification time on disk now
    pub live: DateTime<Utc>,
}

/// Decides synchronously whether a stale snapshot should be rebuilt.
pub trait RebuildPolicy {
    /// Return true to rebuild, false to search the stale snapshot.
    fn should_rebuild(&self, staleness: &Staleness) -> bool;
}

impl<F> RebuildPolicy for F
where
    F: Fn(&Staleness) -> bool,
{
    fn should_rebuild(&self, staleness: &Staleness) -> bool {
        self(staleness)
    }
}

/// Always rebuild stale snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRebuild;

impl RebuildPolicy for AlwaysRebuild {
    fn should_rebuild(&self, _staleness: &Staleness) -> bool {
        true
    }
}

/// Never rebuild; search stale snapshots as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepStale;

impl RebuildPolicy for KeepStale {
    fn should_rebuild(&self, _staleness: &Staleness) -> bool {
        false
    }
}

/// Where the snapshot used by a search came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Loaded from the store and fresh
    Cached,

    /// Taken from the previous session and still fresh
    Reused,

    /// No usable entry existed, built from scratch
    Built,

    /// Entry was stale and the policy asked for a rebuild
    Rebuilt,

    /// Entry was stale and the policy declined a rebuild
    Stale,
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotOrigin::Cached => write!(f, "cached"),
            SnapshotOrigin::Reused => write!(f, "reused"),
            SnapshotOrigin::Built => write!(f, "built"),
            SnapshotOrigin::Rebuilt => write!(f, "rebuilt"),
            SnapshotOrigin::Stale => write!(f, "stale"),
        }
    }
}

/// A snapshot ready to be scanned.
#[derive(Debug, Clone)]
pub struct ResolvedSnapshot {
    pub stored: Arc<StoredSnapshot>,
    pub origin: SnapshotOrigin,

    /// False when the snapshot was built, or taken from a session that was
    /// built, and its entry could not be written
    pub persisted: bool,
}

/// The state one search hands to the next.
///
/// Results are published behind an `Arc` so background work can keep reading
/// them while the next search produces a replacement.
#[derive(Debug, Clone)]
pub struct Session {
    root: String,
    snapshot: Arc<StoredSnapshot>,
    origin: SnapshotOrigin,
    persisted: bool,
    results: Arc<SearchResults>,
}

impl Session {
    /// Normalized root this session searched
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn snapshot(&self) -> &Arc<StoredSnapshot> {
        &self.snapshot
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    /// False if the snapshot came from a build whose entry could not be written
    pub fn persisted(&self) -> bool {
        self.persisted
    }

    pub fn results(&self) -> &Arc<SearchResults> {
        &self.results
    }
}

/// Entry state of one root, for status reporting.
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub root: String,
    pub entry_path: PathBuf,

    /// None if no readable entry exists
    pub entry: Option<EntrySummary>,

    /// None if the root itself is missing
    pub live_modified: Option<DateTime<Utc>>,
}

impl IndexStatus {
    /// Some(true) if both timestamps are known and differ.
    pub fn is_stale(&self) -> Option<bool> {
        match (&self.entry, self.live_modified) {
            (Some(entry), Some(live)) => Some(entry.modified != live),
            _ => None,
        }
    }
}

/// Resolves snapshots through an [`IndexStore`] and runs searches on them.
///
/// ## Example
///
/// ```rust,ignore
/// use findex_core::{IndexStore, KeepStale, SearchEngine, SearchQuery};
///
/// let engine = SearchEngine::new(IndexStore::new("./cache"));
/// let query = SearchQuery::contains("report");
/// let session = engine.search(None, "/home/me", &query, &KeepStale)?;
/// for path in &session.results().paths {
///     println!("{}", path);
/// }
/// ```
pub struct SearchEngine<B: FileSystemBackend = LocalBackend> {
    store: IndexStore,
    backend: B,
    parallel_threshold: Option<usize>,
    log_progress: bool,
}

impl SearchEngine<LocalBackend> {
    /// Create an engine over the local filesystem.
    pub fn new(store: IndexStore) -> Self {
        Self::with_backend(store, LocalBackend::new())
    }

    /// Create an engine from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store =
            IndexStore::new(config.cache_dir()?).with_compression(config.performance.compress_index);
        Ok(Self::new(store).with_parallel_threshold(config.parallel_threshold()))
    }
}

impl<B: FileSystemBackend> SearchEngine<B> {
    /// Create an engine with a custom backend.
    pub fn with_backend(store: IndexStore, backend: B) -> Self {
        SearchEngine {
            store,
            backend,
            parallel_threshold: None,
            log_progress: true,
        }
    }

    /// Scan in parallel when a snapshot has more directories than this.
    pub fn with_parallel_threshold(mut self, threshold: Option<usize>) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Whether builds report progress through tracing.
    pub fn with_progress_logging(mut self, enabled: bool) -> Self {
        self.log_progress = enabled;
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn progress_for(&self, root: &str) -> Option<Arc<dyn ScanProgress>> {
        self.log_progress
            .then(|| Arc::new(LoggingProgress::new(root)) as Arc<dyn ScanProgress>)
    }

    /// Force a full build of `root`, replacing any cached entry.
    ///
    /// Callers must use this after deleting files found by a search.
    pub fn rebuild(&self, root: impl AsRef<Path>) -> Result<BuildOutcome> {
        let root = normalize_root(root);
        self.store
            .build(&self.backend, &root, self.progress_for(&root))
    }

    /// Find a snapshot for `root`, building or rebuilding as needed.
    ///
    /// A root that does not exist is an error even when a cached entry is
    /// available, since freshness cannot be judged without it.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn resolve(
        &self,
        root: impl AsRef<Path>,
        previous: Option<&Session>,
        policy: &dyn RebuildPolicy,
    ) -> Result<ResolvedSnapshot> {
        let root = normalize_root(root);
        let live = self.backend.root_modified(Path::new(&root))?;

        let candidate = match previous.filter(|s| s.root == root) {
            Some(session) => Some((
                Arc::clone(&session.snapshot),
                SnapshotOrigin::Reused,
                session.persisted,
            )),
            None => match self.store.load(&root) {
                Ok(stored) => Some((Arc::new(stored), SnapshotOrigin::Cached, true)),
                Err(FindexError::CacheNotFound { .. }) => {
                    info!(root = %root, "File index not present, creating new index");
                    None
                }
                Err(e) => {
                    warn!(root = %root, error = %e, "Discarding unreadable index entry");
                    None
                }
            },
        };

        let Some((stored, origin, persisted)) = candidate else {
            return self.build_resolved(&root, SnapshotOrigin::Built);
        };

        if !stored.is_stale(live) {
            return Ok(ResolvedSnapshot {
                stored,
                origin,
                persisted,
            });
        }

        let staleness = Staleness {
            root: root.clone(),
            stored: stored.modified,
            live,
        };

        if policy.should_rebuild(&staleness) {
            info!(root = %root, "Root modified since indexing, rebuilding");
            self.build_resolved(&root, SnapshotOrigin::Rebuilt)
        } else {
            info!(
                root = %root,
                stored = %staleness.stored,
                live = %staleness.live,
                "Searching stale index"
            );
            Ok(ResolvedSnapshot {
                stored,
                origin: SnapshotOrigin::Stale,
                persisted,
            })
        }
    }

    fn build_resolved(&self, root: &str, origin: SnapshotOrigin) -> Result<ResolvedSnapshot> {
        let outcome = self.store.build(&self.backend, root, self.progress_for(root))?;
        Ok(ResolvedSnapshot {
            stored: Arc::new(outcome.stored),
            origin,
            persisted: outcome.persisted,
        })
    }

    /// Resolve a snapshot for `root` and scan it with `query`.
    ///
    /// `previous` is the session returned by the last call, if any. The
    /// returned session replaces it; nothing about the previous session is
    /// modified.
    pub fn search(
        &self,
        previous: Option<&Session>,
        root: impl AsRef<Path>,
        query: &SearchQuery,
        policy: &dyn RebuildPolicy,
    ) -> Result<Session> {
        let start = Instant::now();
        let root = normalize_root(root);

        // Compile first so a bad filter never triggers a build.
        let scanner = Scanner::new(query, &root)?;
        let resolved = self.resolve(&root, previous, policy)?;

        let parallel = self
            .parallel_threshold
            .map_or(false, |threshold| resolved.stored.snapshot.len() > threshold);
        let outcome = scanner.run(&resolved.stored.snapshot, parallel);
        let results = SearchResults::new(outcome, start.elapsed());

        info!(
            root = %root,
            origin = %resolved.origin,
            scanned = results.records_scanned,
            matches = results.matches,
            parallel,
            "Search complete"
        );

        Ok(Session {
            root,
            snapshot: resolved.stored,
            origin: resolved.origin,
            persisted: resolved.persisted,
            results: Arc::new(results),
        })
    }

    /// Report the cache entry and freshness of `root` without building.
    pub fn status(&self, root: impl AsRef<Path>) -> Result<IndexStatus> {
        let root = normalize_root(root);
        let entry_path = self.store.entry_path(&root);

        let entry = match self.store.load(&root) {
            Ok(stored) => Some(EntrySummary::from((entry_path.as_path(), &stored))),
            Err(e) if e.requires_rebuild() => None,
            Err(e) => return Err(e),
        };

        let live_modified = match self.backend.root_modified(Path::new(&root)) {
            Ok(live) => Some(live),
            Err(e) if e.is_root_error() => None,
            Err(e) => return Err(e),
        };

        Ok(IndexStatus {
            root,
            entry_path,
            entry,
            live_modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScanOutput;
    use crate::search::{FilterConfig, MatchMode};
    use crate::types::Snapshot;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        tree: TempDir,
        _cache: TempDir,
        engine: SearchEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let tree = TempDir::new().unwrap();
            let root = tree.path();
            fs::create_dir_all(root.join("docs")).unwrap();
            fs::write(root.join("docs/report.txt"), b"").unwrap();
            fs::write(root.join("docs/Report_old.TXT"), b"").unwrap();
            fs::write(root.join("notes.md"), b"").unwrap();

            let cache = TempDir::new().unwrap();
            let engine = SearchEngine::new(IndexStore::new(cache.path())).with_progress_logging(false);
            Fixture {
                tree,
                _cache: cache,
                engine,
            }
        }

        fn root(&self) -> String {
            normalize_root(self.tree.path())
        }

        /// Rewrite the stored entry with a timestamp that cannot match.
        fn make_stale(&self) {
            let mut stored = self.engine.store().load(self.root()).unwrap();
            stored.modified = DateTime::<Utc>::from(std::time::UNIX_EPOCH);
            self.engine.store().save(&stored).unwrap();
        }
    }

    fn refuse(_: &Staleness) -> bool {
        panic!("rebuild policy consulted for a fresh snapshot");
    }

    #[test]
    fn test_first_search_builds() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report");

        let session = fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Built);
        assert!(session.persisted());
        assert!(fx.engine.store().exists(fx.root()));

        let results = session.results();
        assert_eq!(results.matches, 2);
        assert_eq!(results.paths.len(), 2);
        assert!(results.paths.iter().any(|p| p.ends_with("report.txt")));
        assert!(results.paths.iter().any(|p| p.ends_with("Report_old.TXT")));
    }

    #[test]
    fn test_second_search_uses_cache() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report");

        fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        let session = fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Cached);
        assert_eq!(session.results().matches, 2);
    }

    #[test]
    fn test_previous_session_is_reused() {
        let fx = Fixture::new();
        let first = fx
            .engine
            .search(None, fx.root(), &SearchQuery::contains("report"), &refuse)
            .unwrap();
        let second = fx
            .engine
            .search(Some(&first), fx.root(), &SearchQuery::ends_with(".md"), &refuse)
            .unwrap();

        assert_eq!(second.origin(), SnapshotOrigin::Reused);
        assert!(Arc::ptr_eq(first.snapshot(), second.snapshot()));
        assert_eq!(second.results().matches, 1);
        // The earlier results are untouched.
        assert_eq!(first.results().matches, 2);
    }

    #[test]
    fn test_extension_filter_scenario() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report").with_filters(FilterConfig::parse(".txt", "", true));

        let session = fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        let results = session.results();
        assert_eq!(results.matches, 0);
        // Only notes.md is left to compare.
        assert_eq!(results.records_scanned, 1);
    }

    #[test]
    fn test_stale_declined_searches_stale_snapshot() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report");
        fx.engine.search(None, fx.root(), &query, &refuse).unwrap();

        fx.make_stale();
        fs::write(fx.tree.path().join("report_new.txt"), b"").unwrap();

        let asked = AtomicUsize::new(0);
        let decline = |staleness: &Staleness| {
            asked.fetch_add(1, Ordering::Relaxed);
            assert_ne!(staleness.stored, staleness.live);
            false
        };

        let session = fx.engine.search(None, fx.root(), &query, &decline).unwrap();
        assert_eq!(asked.load(Ordering::Relaxed), 1);
        assert_eq!(session.origin(), SnapshotOrigin::Stale);
        assert_eq!(session.results().matches, 2);

        // Nothing was rebuilt: the stored entry still carries the old timestamp.
        let stored = fx.engine.store().load(fx.root()).unwrap();
        assert_eq!(stored.modified, DateTime::<Utc>::from(std::time::UNIX_EPOCH));
    }

    #[test]
    fn test_stale_accepted_rebuilds() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report");
        fx.engine.search(None, fx.root(), &query, &refuse).unwrap();

        fx.make_stale();
        fs::write(fx.tree.path().join("report_new.txt"), b"").unwrap();

        let session = fx
            .engine
            .search(None, fx.root(), &query, &AlwaysRebuild)
            .unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Rebuilt);
        assert_eq!(session.results().matches, 3);

        let status = fx.engine.status(fx.root()).unwrap();
        assert_eq!(status.is_stale(), Some(false));
    }

    #[test]
    fn test_stale_previous_session_consults_policy() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report");
        fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        fx.make_stale();

        let stale = fx.engine.search(None, fx.root(), &query, &KeepStale).unwrap();
        let again = fx
            .engine
            .search(Some(&stale), fx.root(), &query, &KeepStale)
            .unwrap();
        assert_eq!(again.origin(), SnapshotOrigin::Stale);
    }

    #[test]
    fn test_corrupt_entry_is_rebuilt() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("notes");
        fx.engine.search(None, fx.root(), &query, &refuse).unwrap();

        fs::write(fx.engine.store().entry_path(fx.root()), b"garbage garbage garbage garbage garbage")
            .unwrap();

        let session = fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Built);
        assert_eq!(session.results().matches, 1);
    }

    #[test]
    fn test_missing_root_is_reported() {
        let fx = Fixture::new();
        let missing = fx.tree.path().join("does-not-exist");

        let err = fx
            .engine
            .search(None, &missing, &SearchQuery::contains("x"), &refuse)
            .unwrap_err();
        assert!(matches!(err, FindexError::RootNotFound { .. }));

        // The engine is still usable afterwards.
        let session = fx
            .engine
            .search(None, fx.root(), &SearchQuery::contains("notes"), &refuse)
            .unwrap();
        assert_eq!(session.results().matches, 1);
    }

    #[test]
    fn test_rebuild_after_delete() {
        let fx = Fixture::new();
        let query = SearchQuery::contains("report");
        let session = fx.engine.search(None, fx.root(), &query, &refuse).unwrap();

        let doomed = session.results().paths[0].clone();
        fs::remove_file(&doomed).unwrap();
        let outcome = fx.engine.rebuild(fx.root()).unwrap();
        assert!(outcome.persisted);

        let session = fx.engine.search(None, fx.root(), &query, &refuse).unwrap();
        assert_eq!(session.results().matches, 1);
        assert!(!session.results().paths.contains(&doomed));
    }

    #[test]
    fn test_status() {
        let fx = Fixture::new();
        let status = fx.engine.status(fx.root()).unwrap();
        assert!(status.entry.is_none());
        assert!(status.live_modified.is_some());
        assert_eq!(status.is_stale(), None);

        fx.engine.rebuild(fx.root()).unwrap();
        let status = fx.engine.status(fx.root()).unwrap();
        assert_eq!(status.entry.as_ref().map(|e| e.stats.files), Some(3));
        assert_eq!(status.is_stale(), Some(false));
    }

    /// Backend with a scripted timestamp and snapshot.
    struct ScriptedBackend {
        modified: Mutex<DateTime<Utc>>,
        scans: AtomicUsize,
    }

    impl FileSystemBackend for ScriptedBackend {
        fn root_modified(&self, _root: &Path) -> Result<DateTime<Utc>> {
            Ok(*self.modified.lock().unwrap())
        }

        fn scan(&self, root: &Path, _progress: Option<Arc<dyn ScanProgress>>) -> Result<ScanOutput> {
            self.scans.fetch_add(1, Ordering::Relaxed);
            let mut snapshot = Snapshot::new();
            snapshot.push(root.to_string_lossy(), vec![".hidden".to_string(), "visible".to_string()]);
            Ok(ScanOutput {
                snapshot,
                skipped_dirs: 0,
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[test]
    fn test_custom_backend_and_staleness() {
        let cache = TempDir::new().unwrap();
        let backend = ScriptedBackend {
            modified: Mutex::new(Utc::now()),
            scans: AtomicUsize::new(0),
        };
        let engine = SearchEngine::with_backend(IndexStore::new(cache.path()), backend)
            .with_progress_logging(false);

        let query = SearchQuery::new("", MatchMode::Contains)
            .with_filters(FilterConfig::parse("", "", false));
        let session = engine.search(None, "/virtual", &query, &refuse).unwrap();
        assert_eq!(session.results().matches, 2);
        assert_eq!(engine.backend().scans.load(Ordering::Relaxed), 1);

        *engine.backend().modified.lock().unwrap() += chrono::Duration::seconds(5);

        let session = engine
            .search(Some(&session), "/virtual/", &query, &KeepStale)
            .unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Stale);
        assert_eq!(engine.backend().scans.load(Ordering::Relaxed), 1);

        let session = engine
            .search(Some(&session), "/virtual", &query, &AlwaysRebuild)
            .unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Rebuilt);
        assert_eq!(engine.backend().scans.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_reused_session_keeps_persisted_flag() {
        let tree = TempDir::new().unwrap();
        fs::write(tree.path().join("report.txt"), b"").unwrap();

        // A regular file where the cache directory should be.
        let cache = TempDir::new().unwrap();
        let blocker = cache.path().join("blocked");
        fs::write(&blocker, b"").unwrap();
        let engine = SearchEngine::new(IndexStore::new(&blocker)).with_progress_logging(false);

        let query = SearchQuery::contains("report");
        let first = engine.search(None, tree.path(), &query, &refuse).unwrap();
        assert_eq!(first.origin(), SnapshotOrigin::Built);
        assert!(!first.persisted());

        let second = engine
            .search(Some(&first), tree.path(), &query, &refuse)
            .unwrap();
        assert_eq!(second.origin(), SnapshotOrigin::Reused);
        assert!(!second.persisted());
        assert_eq!(second.results().matches, 1);
    }

    /// Restores the working directory when dropped.
    struct CwdGuard(PathBuf);

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    #[test]
    fn test_relative_root_is_resolved_per_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("alpha_report.txt"), b"").unwrap();
        fs::write(second.path().join("beta_report.txt"), b"").unwrap();

        let cache = TempDir::new().unwrap();
        let engine = SearchEngine::new(IndexStore::new(cache.path())).with_progress_logging(false);
        let query = SearchQuery::contains("report");

        let _guard = CwdGuard(std::env::current_dir().unwrap());

        std::env::set_current_dir(first.path()).unwrap();
        let first_key = crate::persistence::cache_key(".");
        let session = engine.search(None, ".", &query, &refuse).unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Built);
        assert_eq!(session.results().paths.len(), 1);
        let path = &session.results().paths[0];
        assert!(Path::new(path).is_absolute(), "relative result: {path}");
        assert!(path.ends_with("alpha_report.txt"));

        std::env::set_current_dir(second.path()).unwrap();
        let second_key = crate::persistence::cache_key(".");
        assert_ne!(first_key, second_key);

        let session = engine.search(None, ".", &query, &refuse).unwrap();
        assert_eq!(session.origin(), SnapshotOrigin::Built);
        assert_eq!(session.results().paths.len(), 1);
        assert!(session.results().paths[0].ends_with("beta_report.txt"));
        assert!(Path::new(&session.results().paths[0]).is_absolute());
    }
}
