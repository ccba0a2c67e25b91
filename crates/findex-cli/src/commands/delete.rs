//! Delete command - remove files found by a search and reindex their root.

use crate::app::{confirm, resolve_root, App};
use findex_core::Config;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Run the delete command.
pub fn run(config: Config, paths: Vec<PathBuf>, root: PathBuf, skip_confirm: bool) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let root = resolve_root(Some(root.as_path()))?;

    for path in &paths {
        println!("  {}", path.display());
    }
    if !skip_confirm && !confirm(&format!("Delete {} file(s)?", paths.len()))? {
        println!("Cancelled.");
        return Ok(());
    }

    let (deleted, failed) = delete_files(&paths);
    println!("Deleted {} file(s).", deleted);
    if failed > 0 {
        println!("⚠ {} file(s) could not be deleted, see the log.", failed);
    }

    // Deletions below the root leave its timestamp unchanged.
    if deleted > 0 {
        println!("Rebuilding index of {}...", root);
        let outcome = app.engine.rebuild(&root)?;
        println!("Index holds {} file(s).", outcome.stored.stats().files);
    }

    Ok(())
}

/// Remove each file, returning (deleted, failed) counts.
fn delete_files(paths: &[PathBuf]) -> (usize, usize) {
    let mut deleted = 0;
    let mut failed = 0;
    for path in paths {
        match remove(path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted");
                deleted += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete");
                failed += 1;
            }
        }
    }
    (deleted, failed)
}

fn remove(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "refusing to delete a directory",
        ));
    }
    fs::remove_file(path)
}
