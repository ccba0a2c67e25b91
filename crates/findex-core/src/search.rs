//! Filtered name matching over a snapshot.
//!
//! A search walks the snapshot's directory records in order and, for each
//! file that survives the exclusion rules, tests its lowercased name against
//! the lowercased query term:
//!
//! - Folder fragments exclude whole directories. A fragment only matches a
//!   complete path segment below the search root (`cache` excludes
//!   `cache/b` but not `mycache2/b`).
//! - Extensions exclude files whose name ends with them, ignoring case.
//! - Dot entries, when ignored, exclude dot-prefixed file names and every
//!   directory below a dot-prefixed segment.
//!
//! Only files that pass the exclusion rules are counted as scanned records.
//!
//! ## Performance
//!
//! Folder fragments are compiled into a single Aho-Corasick automaton. Large
//! snapshots are scanned in parallel via Rayon; results are still reported in
//! snapshot order.

use crate::error::{FindexError, Result};
use crate::types::{DirEntry, Snapshot};
use aho_corasick::AhoCorasick;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::MAIN_SEPARATOR;
use std::str::FromStr;
use std::time::Duration;

/// Separator for extension and folder lists (e.g. `.log;.tmp`)
pub const LIST_SEPARATOR: char = ';';

/// How a file name is compared with the query term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Name contains the term anywhere
    #[default]
    Contains,

    /// Name starts with the term
    StartsWith,

    /// Name ends with the term
    EndsWith,
}

impl MatchMode {
    /// Compare an already-lowercased name with an already-lowercased term.
    pub fn matches(self, name_lower: &str, term_lower: &str) -> bool {
        match self {
            MatchMode::Contains => name_lower.contains(term_lower),
            MatchMode::StartsWith => name_lower.starts_with(term_lower),
            MatchMode::EndsWith => name_lower.ends_with(term_lower),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Contains => write!(f, "contains"),
            MatchMode::StartsWith => write!(f, "starts-with"),
            MatchMode::EndsWith => write!(f, "ends-with"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(MatchMode::Contains),
            "starts-with" | "startswith" | "prefix" => Ok(MatchMode::StartsWith),
            "ends-with" | "endswith" | "suffix" => Ok(MatchMode::EndsWith),
            _ => Err(format!("Unknown match mode: {}", s)),
        }
    }
}

/// Exclusion rules for one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    /// File name suffixes to skip (e.g. ".log")
    pub ignored_extensions: Vec<String>,

    /// Folder names (or `a/b` segment runs) whose directories are skipped
    pub ignored_folders: Vec<String>,

    /// Skip dot-prefixed files and everything under dot-prefixed folders
    pub ignore_dot_entries: bool,
}

impl FilterConfig {
    /// Build a filter from the separator-delimited lists a user typed.
    ///
    /// ```
    /// use findex_core::FilterConfig;
    /// let filters = FilterConfig::parse(".log;.tmp;", "target", true);
    /// assert_eq!(filters.ignored_extensions, vec![".log", ".tmp"]);
    /// ```
    pub fn parse(extensions: &str, folders: &str, ignore_dot_entries: bool) -> Self {
        FilterConfig {
            ignored_extensions: split_list(extensions),
            ignored_folders: split_list(folders),
            ignore_dot_entries,
        }
    }
}

/// Split a separator-delimited list.
///
/// Trailing separators are trimmed, items are whitespace-trimmed, and empty
/// items and duplicates are dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.trim_end_matches(LIST_SEPARATOR).split(LIST_SEPARATOR) {
        let item = item.trim();
        if !item.is_empty() && !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

/// A query term, match mode and exclusion rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    term_lower: String,
    mode: MatchMode,
    filters: FilterConfig,
}

impl SearchQuery {
    /// Create a query with an explicit mode.
    pub fn new(term: &str, mode: MatchMode) -> Self {
        SearchQuery {
            term_lower: term.to_lowercase(),
            mode,
            filters: FilterConfig::default(),
        }
    }

    /// Names containing `term` (case-insensitive).
    ///
    /// # Example
    /// ```
    /// use findex_core::SearchQuery;
    /// let query = SearchQuery::contains("readme");
    /// assert!(query.matches_name("README.md"));
    /// ```
    pub fn contains(term: &str) -> Self {
        Self::new(term, MatchMode::Contains)
    }

    /// Names starting with `term` (case-insensitive).
    pub fn starts_with(term: &str) -> Self {
        Self::new(term, MatchMode::StartsWith)
    }

    /// Names ending with `term` (case-insensitive).
    pub fn ends_with(term: &str) -> Self {
        Self::new(term, MatchMode::EndsWith)
    }

    /// Attach exclusion rules.
    pub fn with_filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    /// The lowercased term
    pub fn term(&self) -> &str {
        &self.term_lower
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// Test a bare file name against term and mode, ignoring filters.
    pub fn matches_name(&self, name: &str) -> bool {
        self.mode.matches(&name.to_lowercase(), &self.term_lower)
    }
}

/// Paths and counters produced by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Matching paths in snapshot order
    pub paths: Vec<String>,

    /// Files that passed the exclusion rules and were compared
    pub records_scanned: u64,
}

/// The published result of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Matching absolute paths in snapshot order
    pub paths: Vec<String>,

    /// Files compared against the query
    pub records_scanned: u64,

    /// Number of matches, always `paths.len()`
    pub matches: u64,

    /// Time taken including snapshot resolution
    pub elapsed: Duration,
}

impl SearchResults {
    pub fn new(outcome: ScanOutcome, elapsed: Duration) -> Self {
        SearchResults {
            matches: outcome.paths.len() as u64,
            paths: outcome.paths,
            records_scanned: outcome.records_scanned,
            elapsed,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A query compiled against one root.
pub struct Scanner<'q> {
    query: &'q SearchQuery,
    root: String,
    folder_matcher: Option<AhoCorasick>,
    extensions_lower: Vec<String>,
}

impl<'q> Scanner<'q> {
    /// Compile `query` for a snapshot of `root`.
    ///
    /// Folder fragments are wrapped in separators so they only match whole
    /// segments; the dot rule becomes a separator followed by a dot.
    pub fn new(query: &'q SearchQuery, root: &str) -> Result<Self> {
        let filters = query.filters();

        let mut patterns: Vec<String> = filters
            .ignored_folders
            .iter()
            .map(|fragment| {
                let fragment = fragment.trim_matches(is_separator);
                format!("{MAIN_SEPARATOR}{fragment}{MAIN_SEPARATOR}")
            })
            .collect();
        if filters.ignore_dot_entries {
            patterns.push(format!("{MAIN_SEPARATOR}."));
        }

        let folder_matcher = if patterns.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::new(&patterns).map_err(|e| FindexError::InvalidPattern {
                    pattern: patterns.join(";"),
                    reason: e.to_string(),
                })?,
            )
        };

        Ok(Scanner {
            query,
            root: root.to_string(),
            folder_matcher,
            extensions_lower: filters
                .ignored_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        })
    }

    /// Run the scan. Output does not depend on `parallel`.
    pub fn run(&self, snapshot: &Snapshot, parallel: bool) -> ScanOutcome {
        let per_dir: Vec<(u64, Vec<String>)> = if parallel {
            snapshot
                .entries()
                .par_iter()
                .map(|entry| self.scan_entry(entry))
                .collect()
        } else {
            snapshot
                .entries()
                .iter()
                .map(|entry| self.scan_entry(entry))
                .collect()
        };

        let mut outcome = ScanOutcome::default();
        for (scanned, mut paths) in per_dir {
            outcome.records_scanned += scanned;
            outcome.paths.append(&mut paths);
        }
        outcome
    }

    fn scan_entry(&self, entry: &DirEntry) -> (u64, Vec<String>) {
        if self.dir_excluded(&entry.dir) {
            return (0, Vec::new());
        }

        let mut scanned = 0u64;
        let mut paths = Vec::new();
        for name in &entry.files {
            let name_lower = name.to_lowercase();
            if self.file_excluded(name, &name_lower) {
                continue;
            }
            scanned += 1;
            if self.query.mode.matches(&name_lower, &self.query.term_lower) {
                paths.push(entry.join(name));
            }
        }
        (scanned, paths)
    }

    /// True if a folder rule matches a segment of `dir` below the root.
    pub fn dir_excluded(&self, dir: &str) -> bool {
        let Some(ref matcher) = self.folder_matcher else {
            return false;
        };

        let relative = dir
            .strip_prefix(self.root.as_str())
            .unwrap_or(dir)
            .trim_matches(is_separator);
        let haystack = if relative.is_empty() {
            MAIN_SEPARATOR.to_string()
        } else {
            format!("{MAIN_SEPARATOR}{relative}{MAIN_SEPARATOR}")
        };
        matcher.is_match(&haystack)
    }

    fn file_excluded(&self, name: &str, name_lower: &str) -> bool {
        if self.query.filters.ignore_dot_entries && name.starts_with('.') {
            return true;
        }
        self.extensions_lower
            .iter()
            .any(|ext| name_lower.ends_with(ext.as_str()))
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == MAIN_SEPARATOR
}
