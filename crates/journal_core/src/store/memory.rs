//! In-process record store.

use super::{RecordStore, RootContext};
use crate::codec;
use crate::delta::ChangeDelta;
use crate::error::{Result, StorageError};
use crate::record::{FetchRequest, Record, RecordId};
use crate::snapshot::{Snapshot, SnapshotEntry};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    /// What the backend holds.
    backing: BTreeMap<RecordId, Record>,
    /// What the store last reported.
    snapshot: Snapshot,
}

/// Record store keeping everything in memory.
///
/// Used for ephemeral sessions and tests. Changes "made elsewhere" can be
/// simulated with [`MemoryStore::external_put`] and
/// [`MemoryStore::external_remove`], which touch the backing map without
/// updating the snapshot, and write failures can be injected with
/// [`MemoryStore::fail_writes`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
    root_context: RootContext,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert/update/delete fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stores or replaces a record as an outside writer would.
    pub fn external_put(&self, record: Record) {
        self.state().backing.insert(record.id().clone(), record);
    }

    /// Removes a record as an outside writer would.
    pub fn external_remove(&self, id: &RecordId) {
        self.state().backing.remove(id);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected_failure(&self) -> Option<io::Error> {
        self.fail_writes
            .load(Ordering::SeqCst)
            .then(|| io::Error::other("injected write failure"))
    }
}

fn entry_for(record: &Record) -> SnapshotEntry {
    SnapshotEntry::new(record.clone(), &codec::encode(record))
}

impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch_all(&self, request: FetchRequest) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = self.state().backing.values().cloned().collect();
        request.sort(&mut records);
        Ok(records)
    }

    fn load(&self, request: FetchRequest) -> Result<Vec<Record>> {
        let mut state = self.state();
        let mut records: Vec<Record> = state.backing.values().cloned().collect();
        let observed = records
            .iter()
            .map(|record| (record.id().clone(), entry_for(record)))
            .collect();
        state.snapshot.reset(observed);
        request.sort(&mut records);
        Ok(records)
    }

    fn insert(&self, record: &Record) -> Result<()> {
        let id = record.id().clone();
        if let Some(source) = self.injected_failure() {
            return Err(StorageError::WriteFailed { id, source });
        }

        let mut state = self.state();
        if state.backing.contains_key(&id) {
            return Err(StorageError::WriteFailed {
                id,
                source: io::Error::new(io::ErrorKind::AlreadyExists, "record already exists"),
            });
        }
        state.backing.insert(id, record.clone());
        state.snapshot.insert(entry_for(record));
        Ok(())
    }

    fn update(&self, record: &Record) -> Result<()> {
        let id = record.id().clone();
        let mut state = self.state();
        if !state.snapshot.contains(&id) || !state.backing.contains_key(&id) {
            return Err(StorageError::Missing(id));
        }
        if let Some(source) = self.injected_failure() {
            return Err(StorageError::WriteFailed { id, source });
        }

        state.backing.insert(id, record.clone());
        state.snapshot.insert(entry_for(record));
        Ok(())
    }

    fn delete(&self, record: &Record) -> Result<()> {
        if let Some(source) = self.injected_failure() {
            return Err(StorageError::DeleteFailed {
                id: record.id().clone(),
                source,
            });
        }

        let mut state = self.state();
        state.backing.remove(record.id());
        state.snapshot.remove(record.id());
        Ok(())
    }

    fn detect_external_changes(&self) -> Result<Vec<ChangeDelta>> {
        let mut state = self.state();
        let observed = state
            .backing
            .values()
            .map(|record| (record.id().clone(), entry_for(record)))
            .collect();
        Ok(state.snapshot.reconcile(observed))
    }

    fn contains(&self, id: &RecordId) -> bool {
        self.state().snapshot.contains(id)
    }

    fn current(&self, id: &RecordId) -> Option<Record> {
        self.state().snapshot.get(id).map(|entry| entry.record.clone())
    }

    fn root_context(&self) -> &RootContext {
        &self.root_context
    }
}
