//! # findex Core Library
//!
//! This crate provides snapshot building, persistence and search for the
//! findex file search tool. Filesystem access sits behind the
//! [`FileSystemBackend`] trait so the engine can be driven by something other
//! than the local disk.
//!
//! ## Architecture
//!
//! - **Backend** (`backend`): Interface for walking a root and reading its timestamp
//! - **Walk** (`walk`): The local filesystem backend
//! - **Types** (`types`): Snapshots, directory records and root normalization
//! - **Persistence** (`persistence`): Per-root cache entries on disk
//! - **Search** (`search`): Query, exclusion rules and the snapshot scanner
//! - **Engine** (`engine`): Snapshot resolution, staleness and sessions
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use findex_core::{FilterConfig, IndexStore, KeepStale, SearchEngine, SearchQuery};
//!
//! let engine = SearchEngine::new(IndexStore::new("./cache"));
//! let query = SearchQuery::contains("report")
//!     .with_filters(FilterConfig::parse(".txt", "node_modules", true));
//!
//! let session = engine.search(None, "/home/me", &query, &KeepStale)?;
//! println!("Searched {} records", session.results().records_scanned);
//! for path in &session.results().paths {
//!     println!("{}", path);
//! }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod search;
pub mod types;
pub mod walk;

// Re-export commonly used types
pub use backend::{FileSystemBackend, LoggingProgress, ScanOutput, ScanProgress};
pub use config::{Config, FilterDefaults};
pub use engine::{
    AlwaysRebuild, IndexStatus, KeepStale, RebuildPolicy, ResolvedSnapshot, SearchEngine, Session,
    SnapshotOrigin, Staleness,
};
pub use error::{FindexError, Result};
pub use persistence::{cache_key, BuildOutcome, ClearSummary, EntrySummary, IndexStore};
pub use search::{FilterConfig, MatchMode, Scanner, SearchQuery, SearchResults};
pub use types::{normalize_root, DirEntry, Snapshot, SnapshotStats, StoredSnapshot};
pub use walk::LocalBackend;
