//! Ensures only one teamhub-server instance serves a given data file.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// A lock guard that releases the lock when dropped
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// `hub.json` is guarded by `hub.json.lock` next to it.
fn lock_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Acquire an exclusive lock on `data_path`, failing if another instance
/// holds it. Two servers writing the same snapshot file would lose updates.
pub fn acquire_lock(data_path: &Path) -> Result<LockGuard> {
    let path = lock_path(data_path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(&path).context("Failed to create lock file")?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another teamhub-server instance is already serving {}.\n\
            If you believe this is an error, remove: {}",
            data_path.display(),
            path.display()
        )
    })?;

    Ok(LockGuard { _file: file, path })
}
