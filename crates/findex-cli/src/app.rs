//! Application state management.

use anyhow::Context;
use directories::UserDirs;
use findex_core::{normalize_root, Config, SearchEngine};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// Snapshot store and search engine
    pub engine: SearchEngine,
}

impl App {
    /// Create a new application instance.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let engine = SearchEngine::from_config(&config)?;

        info!(
            cache_dir = %engine.store().base_dir().display(),
            "Application initialized"
        );

        Ok(App { config, engine })
    }
}

/// Turn an optional user-supplied root into a normalized absolute path.
///
/// Without a root the user's home directory is used.
pub fn resolve_root(root: Option<&Path>) -> anyhow::Result<String> {
    match root {
        Some(path) => Ok(normalize_root(path)),
        None => Ok(normalize_root(home_dir()?)),
    }
}

fn home_dir() -> anyhow::Result<PathBuf> {
    UserDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .context("Cannot determine the home directory; pass a root explicitly")
}

/// Ask a yes/no question on the terminal. Anything but "y" is a no.
pub fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
