//! Search command - find files by name under a root.

use crate::app::{confirm, resolve_root, App};
use crate::{OutputFormat, StalePolicy};
use anyhow::Context;
use findex_core::{
    AlwaysRebuild, Config, KeepStale, MatchMode, RebuildPolicy, SearchQuery, Session, Staleness,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Arguments of the search command.
pub struct SearchArgs {
    pub query: String,
    pub root: Option<PathBuf>,
    pub mode: Option<MatchMode>,
    pub ext: Option<String>,
    pub dir: Option<String>,
    pub include_dot: bool,
    pub on_stale: StalePolicy,
    pub limit: Option<usize>,
    pub output: OutputFormat,
    pub save: Option<PathBuf>,
}

/// Run the search command.
pub fn run(config: Config, args: SearchArgs) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let root = resolve_root(args.root.as_deref())?;

    let filters = app.config.filters.resolve(
        args.ext.as_deref(),
        args.dir.as_deref(),
        args.include_dot.then_some(false),
    );
    let mode = args.mode.unwrap_or(app.config.filters.mode);
    let query = SearchQuery::new(&args.query, mode).with_filters(filters);

    let policy: Box<dyn RebuildPolicy> = match args.on_stale {
        StalePolicy::Ask => Box::new(ask_rebuild),
        StalePolicy::Rebuild => Box::new(AlwaysRebuild),
        StalePolicy::Keep => Box::new(KeepStale),
    };

    eprintln!("Loading file index");
    let session = app.engine.search(None, &root, &query, policy.as_ref())?;

    if !session.persisted() {
        eprintln!("Warning: the index could not be saved and will be rebuilt next time.");
    }

    if let Some(ref path) = args.save {
        save_results(path, &session.results().paths)?;
    }

    let limit = args.limit.unwrap_or(app.config.general.max_results);
    match args.output {
        OutputFormat::Text => {
            let results = session.results();
            let shown = if limit == 0 { results.len() } else { limit };
            for path in results.paths.iter().take(shown) {
                println!("{}", path);
            }

            eprintln!();
            eprintln!("Searched {} records", results.records_scanned);
            eprintln!("Files found {}", results.matches);
            if results.len() > shown {
                eprintln!("Showing first {} (use --limit 0 for all)", shown);
            }
            eprintln!(
                "Completed in {:.3}ms ({} index)",
                results.elapsed.as_secs_f64() * 1000.0,
                session.origin()
            );
        }
        OutputFormat::Json => {
            let report = json_report(&session, limit);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn ask_rebuild(staleness: &Staleness) -> bool {
    let prompt = format!(
        "The index of {} is out of date (indexed {}, modified {}). Rebuild it?",
        staleness.root,
        staleness.stored.format("%Y-%m-%d %H:%M:%S"),
        staleness.live.format("%Y-%m-%d %H:%M:%S"),
    );
    match confirm(&prompt) {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, "Cannot read answer, searching the old index");
            false
        }
    }
}

fn json_report(session: &Session, limit: usize) -> serde_json::Value {
    let results = session.results();
    let shown = if limit == 0 { results.len() } else { limit };
    let stats = session.snapshot().stats();

    serde_json::json!({
        "root": session.root(),
        "index": {
            "origin": session.origin().to_string(),
            "persisted": session.persisted(),
            "indexed_at": session.snapshot().indexed_at.to_rfc3339(),
            "dirs": stats.dirs,
            "files": stats.files,
        },
        "records_scanned": results.records_scanned,
        "matches": results.matches,
        "elapsed_ms": results.elapsed.as_secs_f64() * 1000.0,
        "paths": results.paths.iter().take(shown).collect::<Vec<_>>(),
    })
}

/// Write every matching path to `path`, one per line.
fn save_results(path: &Path, paths: &[String]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create result file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in paths {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use findex_core::{IndexStore, SearchEngine};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_save_results() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("results.txt");
        let paths = vec!["/a/one.txt".to_string(), "/b/two.txt".to_string()];

        save_results(&path, &paths).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "/a/one.txt\n/b/two.txt\n");
    }

    #[test]
    fn test_json_report() {
        let tree = TempDir::new().unwrap();
        for name in ["alpha.txt", "alpha.md", "beta.txt"] {
            fs::write(tree.path().join(name), b"").unwrap();
        }
        let cache = TempDir::new().unwrap();
        let engine = SearchEngine::new(IndexStore::new(cache.path()));

        let session = engine
            .search(None, tree.path(), &SearchQuery::contains("alpha"), &KeepStale)
            .unwrap();
        let report = json_report(&session, 1);

        assert_eq!(report["matches"], 2);
        assert_eq!(report["records_scanned"], 3);
        assert_eq!(report["index"]["origin"], "built");
        assert_eq!(report["paths"].as_array().map(Vec::len), Some(1));
    }
}
