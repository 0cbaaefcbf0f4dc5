//! Filesystem helpers shared by the stores and the config loader.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Marker embedded in temp file names: `.<name>.tmp.<pid>`.
const TMP_MARKER: &str = ".tmp.";

/// Temp files older than this are leftovers of a crashed writer.
pub(crate) const STALE_TMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Path of the hidden temp file used to publish `path`.
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed");
    path.with_file_name(format!(".{}{}{}", name, TMP_MARKER, std::process::id()))
}

/// Writes `bytes` to `path` atomically.
///
/// Uses temp file + fsync + rename so concurrent readers see either the old
/// file, no file, or the complete new file. The temp file is removed if any
/// step fails.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = tmp_path_for(path);

    let written = (|| {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // fsync parent directory (Unix-specific for crash safety)
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Ok(dir_file) = File::open(parent) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}

/// Removes `path`, treating an already missing file as success.
///
/// Returns whether this call removed the file.
pub(crate) fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Deletes temp files in `dir` older than `max_age`.
///
/// Only hidden files carrying the temp marker are considered. Returns the
/// number of files removed.
pub(crate) fn cleanup_stale_temps(dir: &Path, max_age: Duration) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with('.') || !name.contains(TMP_MARKER) {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if age.is_some_and(|age| age >= max_age) {
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    debug!(file = name, "removed stale temp file");
                    deleted += 1;
                }
                Err(e) => warn!(file = name, error = %e, "failed to remove stale temp file"),
            }
        }
    }

    deleted
}
