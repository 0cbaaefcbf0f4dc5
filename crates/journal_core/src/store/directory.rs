//! File-per-record store over a single directory.

use super::lock::LockGuard;
use super::{RecordStore, RootContext};
use crate::codec;
use crate::delta::ChangeDelta;
use crate::error::{Result, StorageError};
use crate::fsutil;
use crate::record::{FetchRequest, Record, RecordId};
use crate::snapshot::{Snapshot, SnapshotEntry};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Record store keeping one `<id>.txt` file per record directly under `root`.
///
/// Other processes may create and delete files in the directory at any time
/// without coordination. The store stays correct because:
///
/// - its own writes are published by rename, so a scan never sees a partial
///   record written by this store;
/// - a file that cannot be decoded (for instance one an external tool is
///   still writing) is treated as absent, or as unchanged if the record was
///   already known;
/// - a file vanishing between listing and reading is treated as absent;
/// - deleting a missing file succeeds.
///
/// Writes and reconciliation scans issued through this store are serialized
/// on the snapshot mutex, so a scan never reports the store's own
/// in-progress insert or delete as an external change.
///
/// # Examples
///
/// ```
/// use journal_core::{DirectoryStore, FetchRequest, Record, RecordStore};
/// use chrono::Utc;
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = DirectoryStore::open(tmp.path().join("Journal")).unwrap();
///
/// let record = Record::new("hello", Utc::now());
/// store.insert(&record).unwrap();
///
/// let records = store.fetch_all(FetchRequest::default()).unwrap();
/// assert_eq!(records, vec![record]);
/// ```
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    snapshot: Mutex<Snapshot>,
    root_context: RootContext,
    lock: Option<LockGuard>,
}

impl DirectoryStore {
    /// Opens a store over `root` without taking the directory lock.
    ///
    /// The directory is not created until the first write. Stale temp files
    /// left by a crashed writer are removed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() && !root.is_dir() {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("storage path is not a directory: {}", root.display()),
            )));
        }

        let removed = fsutil::cleanup_stale_temps(&root, fsutil::STALE_TMP_AGE);
        if removed > 0 {
            debug!(removed, root = %root.display(), "cleaned up stale temp files");
        }

        Ok(Self {
            root,
            snapshot: Mutex::new(Snapshot::default()),
            root_context: RootContext::default(),
            lock: None,
        })
    }

    /// Opens a store and takes the exclusive session lock on its directory.
    ///
    /// The directory is created immediately so the lock file has a home.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another store holds the lock.
    pub fn open_exclusive(root: impl AsRef<Path>) -> Result<Self> {
        let lock = LockGuard::acquire(root.as_ref())?;
        let mut store = Self::open(root)?;
        store.lock = Some(lock);
        Ok(store)
    }

    /// Whether this store holds the directory lock.
    pub fn is_exclusive(&self) -> bool {
        self.lock.is_some()
    }

    /// Path of the backing file for `id`.
    pub fn record_path(&self, id: &RecordId) -> PathBuf {
        self.root.join(codec::file_name(id))
    }

    fn snapshot(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads every decodable record file in the directory.
    ///
    /// With `known`, a record file that exists but does not decode keeps its
    /// known entry instead of disappearing for one pass.
    fn scan(&self, known: Option<&Snapshot>) -> Result<BTreeMap<RecordId, SnapshotEntry>> {
        let mut observed = BTreeMap::new();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(observed),
            Err(e) => return Err(StorageError::Io(e)),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "directory entry vanished during scan");
                    continue;
                }
            };

            let file_name = entry.file_name();
            let Some(id) = file_name.to_str().and_then(codec::parse_file_name) else {
                continue;
            };

            let path = entry.path();
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(record = %id, "record file removed during scan");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable record file");
                    continue;
                }
            };

            match codec::decode(id.clone(), &bytes) {
                Ok(record) => {
                    observed.insert(id, SnapshotEntry::new(record, &bytes));
                }
                Err(reason) => {
                    debug!(path = %path.display(), %reason, "record file not decodable, treating as unchanged");
                    if let Some(entry) = known.and_then(|snapshot| snapshot.get(&id)) {
                        observed.insert(id, entry.clone());
                    }
                }
            }
        }

        Ok(observed)
    }

    fn write_record(&self, record: &Record) -> io::Result<Vec<u8>> {
        fs::create_dir_all(&self.root)?;
        let bytes = codec::encode(record);
        fsutil::write_atomic(&self.record_path(record.id()), &bytes)?;
        Ok(bytes)
    }

    /// Parses a single record file, reporting decode failures.
    pub fn read_record(&self, id: &RecordId) -> Result<Record> {
        let path = self.record_path(id);
        let bytes = fs::read(&path)?;
        codec::decode(id.clone(), &bytes).map_err(|reason| StorageError::InvalidRecord {
            path,
            reason: reason.to_string(),
        })
    }
}

impl RecordStore for DirectoryStore {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn fetch_all(&self, request: FetchRequest) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = self
            .scan(None)?
            .into_values()
            .map(|entry| entry.record)
            .collect();
        request.sort(&mut records);
        Ok(records)
    }

    fn load(&self, request: FetchRequest) -> Result<Vec<Record>> {
        let mut snapshot = self.snapshot();
        let observed = self.scan(Some(&snapshot))?;
        let mut records: Vec<Record> = observed.values().map(|entry| entry.record.clone()).collect();
        snapshot.reset(observed);
        request.sort(&mut records);

        debug!(records = records.len(), root = %self.root.display(), "loaded snapshot");
        Ok(records)
    }

    fn insert(&self, record: &Record) -> Result<()> {
        let mut snapshot = self.snapshot();
        let id = record.id();

        if snapshot.contains(id) || self.record_path(id).exists() {
            return Err(StorageError::WriteFailed {
                id: id.clone(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "record file already exists"),
            });
        }

        let bytes = self.write_record(record).map_err(|source| StorageError::WriteFailed {
            id: id.clone(),
            source,
        })?;

        snapshot.insert(SnapshotEntry::new(record.clone(), &bytes));
        debug!(record = %id, "inserted record");
        Ok(())
    }

    fn update(&self, record: &Record) -> Result<()> {
        let mut snapshot = self.snapshot();
        let id = record.id();

        // A file removed externally stays removed; the next pass reports it.
        if !snapshot.contains(id) || !self.record_path(id).exists() {
            return Err(StorageError::Missing(id.clone()));
        }

        let bytes = self.write_record(record).map_err(|source| StorageError::WriteFailed {
            id: id.clone(),
            source,
        })?;

        snapshot.insert(SnapshotEntry::new(record.clone(), &bytes));
        debug!(record = %id, "updated record");
        Ok(())
    }

    fn delete(&self, record: &Record) -> Result<()> {
        let mut snapshot = self.snapshot();
        let id = record.id();

        let removed = fsutil::remove_if_present(&self.record_path(id)).map_err(|source| {
            StorageError::DeleteFailed {
                id: id.clone(),
                source,
            }
        })?;

        snapshot.remove(id);
        debug!(record = %id, removed, "deleted record");
        Ok(())
    }

    fn detect_external_changes(&self) -> Result<Vec<ChangeDelta>> {
        let mut snapshot = self.snapshot();
        let observed = self.scan(Some(&snapshot))?;
        let deltas = snapshot.reconcile(observed);

        if !deltas.is_empty() {
            debug!(deltas = deltas.len(), root = %self.root.display(), "reconciliation pass found changes");
        }
        Ok(deltas)
    }

    fn contains(&self, id: &RecordId) -> bool {
        self.snapshot().contains(id)
    }

    fn current(&self, id: &RecordId) -> Option<Record> {
        self.snapshot().get(id).map(|entry| entry.record.clone())
    }

    fn root_context(&self) -> &RootContext {
        &self.root_context
    }
}
