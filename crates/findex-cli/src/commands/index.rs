//! Index command - build or rebuild the index of a root.

use crate::app::{resolve_root, App};
use findex_core::Config;
use std::path::PathBuf;

/// Run the index command.
pub fn run(config: Config, root: Option<PathBuf>) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let root = resolve_root(root.as_deref())?;

    println!("Building file index of {}...", root);
    println!();

    let outcome = app.engine.rebuild(&root)?;
    let stats = outcome.stored.stats();
    let elapsed = outcome.elapsed;

    println!("Indexing complete!");
    println!("  Files:       {}", stats.files);
    println!("  Directories: {}", stats.dirs);
    if stats.skipped_dirs > 0 {
        println!("  Unreadable:  {} (skipped)", stats.skipped_dirs);
    }
    println!("  Time:        {:.2}s", elapsed.as_secs_f64());
    println!(
        "  Rate:        {:.0} entries/sec",
        (stats.files + stats.dirs) as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    match outcome.write_error {
        None => println!(
            "  Saved to:    {}",
            app.engine.store().entry_path(&root).display()
        ),
        Some(reason) => println!("  ⚠ Not saved: {}", reason),
    }

    Ok(())
}
