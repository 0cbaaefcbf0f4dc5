//! Advisory lock that keeps two sessions off one storage directory.
//!
//! The lock only coordinates instances of this library. External tools
//! (including the hammer) never look at it.

use crate::error::{Result, StorageError};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file inside the storage directory.
pub(crate) const LOCK_FILE: &str = ".journal.lock";

/// RAII guard for the directory lock.
///
/// The lock file is left in place on release; only the OS lock matters.
#[derive(Debug)]
pub(crate) struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Acquires the exclusive lock on `dir`, creating the directory if needed.
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| StorageError::Locked(dir.to_path_buf()))?;

        // Record our PID for humans inspecting the directory.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        debug!(path = %path.display(), "acquired directory lock");
        Ok(Self { file, path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!(path = %self.path.display(), error = %e, "failed to release directory lock");
            return;
        }
        debug!(path = %self.path.display(), "released directory lock");
    }
}
