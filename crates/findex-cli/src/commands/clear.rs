//! Clear command - remove all cached indexes.

use crate::app::{confirm, App};
use findex_core::Config;

/// Run the clear command.
pub fn run(config: Config, skip_confirm: bool) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let store = app.engine.store();

    let entries = store.entries()?;
    if entries.is_empty() && !store.base_dir().exists() {
        println!("No index found. Nothing to clear.");
        return Ok(());
    }

    if !skip_confirm
        && !confirm(&format!(
            "This will delete {} cached index(es). Are you sure?",
            entries.len()
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let summary = store.clear_all();
    println!("Removed {} index file(s).", summary.removed);
    if summary.failed > 0 {
        println!("⚠ {} file(s) could not be removed, see the log.", summary.failed);
    }

    Ok(())
}
