//! Configuration management for findex.
//!
//! Configuration is stored in TOML format in a platform-appropriate location
//! and only supplies defaults: every search still builds its own
//! [`FilterConfig`] from what the caller passes in.

use crate::error::{FindexError, Result};
use crate::search::{FilterConfig, MatchMode, LIST_SEPARATOR};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for findex.
///
/// ## Example Configuration File (findex.toml)
///
/// ```toml
/// [general]
/// cache_dir = "/var/tmp/findex"
/// max_results = 500
///
/// [filters]
/// extensions = [".o", ".pyc"]
/// folders = ["node_modules", "target"]
/// ignore_dot_entries = true
/// mode = "contains"
///
/// [performance]
/// parallel_search = true
/// parallel_threshold = 2000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Default exclusion rules
    pub filters: FilterDefaults,

    /// Performance tuning
    pub performance: PerformanceConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Cache directory (None = default location)
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of results to print (0 = all)
    pub max_results: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            cache_dir: None,
            max_results: 0,
            log_level: "info".to_string(),
        }
    }
}

/// Exclusion defaults applied when a search does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    /// File name suffixes to skip
    pub extensions: Vec<String>,

    /// Folder names to skip
    pub folders: Vec<String>,

    /// Skip dot files and dot folders
    pub ignore_dot_entries: bool,

    /// Default match mode
    pub mode: MatchMode,
}

impl Default for FilterDefaults {
    fn default() -> Self {
        FilterDefaults {
            extensions: Vec::new(),
            folders: Vec::new(),
            ignore_dot_entries: true,
            mode: MatchMode::Contains,
        }
    }
}

impl FilterDefaults {
    /// Build a filter, letting each provided list replace its default.
    pub fn resolve(
        &self,
        extensions: Option<&str>,
        folders: Option<&str>,
        ignore_dot_entries: Option<bool>,
    ) -> FilterConfig {
        let separator = LIST_SEPARATOR.to_string();
        let default_extensions = self.extensions.join(&separator);
        let default_folders = self.folders.join(&separator);

        FilterConfig::parse(
            extensions.unwrap_or(&default_extensions),
            folders.unwrap_or(&default_folders),
            ignore_dot_entries.unwrap_or(self.ignore_dot_entries),
        )
    }
}

/// Performance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Use parallel scanning for large snapshots
    pub parallel_search: bool,

    /// Directory count above which scanning goes parallel
    pub parallel_threshold: usize,

    /// Use compression for cache entries
    pub compress_index: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            parallel_search: true,
            parallel_threshold: 2_000,
            compress_index: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| FindexError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FindexError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("findex.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Get the cache directory (from config or default).
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match self.general.cache_dir {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::default_data_dir()?.join("indexes")),
        }
    }

    /// Directory count above which scans run in parallel, if enabled.
    pub fn parallel_threshold(&self) -> Option<usize> {
        self.performance
            .parallel_search
            .then_some(self.performance.parallel_threshold)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "findex").ok_or_else(|| FindexError::ConfigError {
        reason: "Could not determine project directories".to_string(),
    })
}
