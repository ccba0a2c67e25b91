//! Open command - hand a result to the system's default application.

use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error};

/// Run the open command.
pub fn run(path: PathBuf, reveal: bool) -> anyhow::Result<()> {
    let target = open_target(&path, reveal)?;
    spawn_open(target)
        .join()
        .map_err(|_| anyhow::anyhow!("Opener thread panicked"))?;
    Ok(())
}

/// The file itself, or its folder when revealing.
fn open_target(path: &Path, reveal: bool) -> anyhow::Result<PathBuf> {
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }
    if !reveal {
        return Ok(path.to_path_buf());
    }
    Ok(path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Launch the system opener on its own thread.
///
/// Failures are logged; nothing is reported back to the caller.
pub fn spawn_open(target: PathBuf) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        debug!(path = %target.display(), "Opening");
        if let Err(e) = open::that(&target) {
            error!(path = %target.display(), error = %e, "Failed to open");
        }
    })
}
