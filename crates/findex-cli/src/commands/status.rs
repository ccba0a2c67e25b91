//! Status command - show cached indexes and their freshness.

use crate::app::{resolve_root, App};
use chrono::{DateTime, Local, Utc};
use findex_core::{Config, EntrySummary};
use std::path::PathBuf;

/// Run the status command.
pub fn run(config: Config, root: Option<PathBuf>) -> anyhow::Result<()> {
    let app = App::new(config)?;

    println!("findex Index Status");
    println!("===================");
    println!();

    match root {
        Some(root) => show_root(&app, resolve_root(Some(root.as_path()))?)?,
        None => show_all(&app)?,
    }

    // Show cache directory
    println!();
    println!(
        "Cache directory: {}",
        app.engine.store().base_dir().display()
    );

    Ok(())
}

fn show_root(app: &App, root: String) -> anyhow::Result<()> {
    let status = app.engine.status(&root)?;

    println!("Root: {}", status.root);
    match status.entry {
        None => {
            println!("  Not indexed. Run 'findex index {}' to build it.", status.root);
        }
        Some(ref entry) => {
            print_entry(entry);
            let freshness = match status.is_stale() {
                Some(false) => "✓ up to date",
                Some(true) => "⚠ out of date",
                None => "⚠ root is missing",
            };
            println!("  Status:      {}", freshness);
        }
    }
    println!("  Entry file:  {}", status.entry_path.display());

    Ok(())
}

fn show_all(app: &App) -> anyhow::Result<()> {
    let entries = app.engine.store().entries()?;

    if entries.is_empty() {
        println!("No indexes cached. Run 'findex search' or 'findex index' to build one.");
        return Ok(());
    }

    let total_files: u64 = entries.iter().map(|e| e.stats.files).sum();
    println!("Summary:");
    println!("  Cached roots: {}", entries.len());
    println!("  Total files:  {}", total_files);

    println!();
    println!("Cached Roots:");
    for entry in &entries {
        println!("  {}", entry.root);
        print_entry(entry);
    }

    Ok(())
}

fn print_entry(entry: &EntrySummary) {
    println!("    Files:       {}", entry.stats.files);
    println!("    Directories: {}", entry.stats.dirs);
    if entry.stats.skipped_dirs > 0 {
        println!("    Unreadable:  {}", entry.stats.skipped_dirs);
    }
    println!("    Indexed at:  {}", local_time(entry.indexed_at));
}

fn local_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
