//! # findex CLI
//!
//! Command-line interface for the findex file search tool.
//!
//! ## Commands
//!
//! - `findex search <query> [ROOT]` - Search file names under a root
//! - `findex index [ROOT]` - Build or rebuild the index of a root
//! - `findex status [ROOT]` - Show cached indexes and their freshness
//! - `findex clear` - Delete every cached index
//! - `findex open <PATH>` - Open a result with the system handler
//! - `findex delete <PATH>... --root <ROOT>` - Delete results and reindex
//! - `findex config` - Show or create the configuration file
//!
//! ## Example Usage
//!
//! ```bash
//! # Find every report under the home directory
//! findex search report
//!
//! # Skip .log files and anything below node_modules
//! findex search config ~/src --ext ".log" --dir "node_modules"
//!
//! # Show what is cached
//! findex status
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use findex_core::MatchMode;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// findex - Search file names under a directory tree
#[derive(Parser)]
#[command(name = "findex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "FINDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for files whose name matches a term
    #[command(alias = "s")]
    Search {
        /// Term to look for (case-insensitive)
        query: String,

        /// Directory to search (defaults to the home directory)
        root: Option<PathBuf>,

        /// How the term is matched (contains, starts-with, ends-with)
        #[arg(short, long)]
        mode: Option<MatchMode>,

        /// Extensions to skip, separated by ';' (e.g. ".log;.tmp")
        #[arg(short, long)]
        ext: Option<String>,

        /// Folder names to skip, separated by ';' (e.g. "node_modules;target")
        #[arg(short, long)]
        dir: Option<String>,

        /// Include dot files and dot folders
        #[arg(long)]
        include_dot: bool,

        /// What to do when the cached index is out of date
        #[arg(long, value_enum, default_value_t = StalePolicy::Ask)]
        on_stale: StalePolicy,

        /// Maximum number of results to print (0 = all)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,

        /// Also write the matching paths to a file, one per line
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Build or rebuild the index of a directory
    Index {
        /// Directory to index (defaults to the home directory)
        root: Option<PathBuf>,
    },

    /// Show cached indexes and whether they are up to date
    Status {
        /// Only show this directory
        root: Option<PathBuf>,
    },

    /// Delete every cached index
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Open a file with the system's default application
    Open {
        path: PathBuf,

        /// Open the containing folder instead
        #[arg(short, long)]
        reveal: bool,
    },

    /// Show the configuration, or write a default configuration file
    Config {
        /// Create the configuration file with default values
        #[arg(long)]
        init: bool,
    },

    /// Delete files and rebuild the index they came from
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Indexed directory the files belong to
        #[arg(short, long)]
        root: PathBuf,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Reaction to an out-of-date index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StalePolicy {
    /// Prompt on the terminal
    #[default]
    Ask,
    /// Rebuild without asking
    Rebuild,
    /// Search the old index
    Keep,
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => findex_core::Config::load_from(path)?,
        None => findex_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.general.log_level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    // Execute command
    match cli.command {
        Commands::Search {
            query,
            root,
            mode,
            ext,
            dir,
            include_dot,
            on_stale,
            limit,
            output,
            save,
        } => commands::search::run(
            config,
            commands::search::SearchArgs {
                query,
                root,
                mode,
                ext,
                dir,
                include_dot,
                on_stale,
                limit,
                output,
                save,
            },
        ),
        Commands::Index { root } => commands::index::run(config, root),
        Commands::Status { root } => commands::status::run(config, root),
        Commands::Clear { yes } => commands::clear::run(config, yes),
        Commands::Open { path, reveal } => commands::open::run(path, reveal),
        Commands::Config { init } => commands::config::run(config, cli.config, init),
        Commands::Delete { paths, root, yes } => commands::delete::run(config, paths, root, yes),
    }
}
