//! Config command - show or create the configuration file.

use findex_core::Config;
use std::path::{Path, PathBuf};

/// Run the config command.
pub fn run(config: Config, path: Option<PathBuf>, init: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if init {
        if write_default(&path)? {
            println!("Wrote default configuration to {}", path.display());
        } else {
            println!("{} already exists, leaving it unchanged.", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Write the default configuration unless a file is already there.
fn write_default(path: &Path) -> anyhow::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    Config::default().save_to(path)?;
    Ok(true)
}
