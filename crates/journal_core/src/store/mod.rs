//! Storage backends for journal records.
//!
//! A [`RecordStore`] is the sole mediator between logical records and their
//! physical representation. Besides serving fetch/insert/update/delete it
//! reports changes made behind its back: [`RecordStore::detect_external_changes`]
//! diffs what the backend currently holds against the store's private
//! snapshot, and [`RecordStore::refresh`] hands those deltas to the one
//! registered recipient (the session's root context).

mod directory;
mod lock;
mod memory;
mod registry;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;
pub use registry::{StoreFactory, StoreRegistry};

use crate::delta::ChangeDelta;
use crate::error::Result;
use crate::record::{FetchRequest, Record, RecordId};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Callback through which a store delivers deltas to its root context.
///
/// The callback must not block; the session's implementation only posts a
/// job onto its main lane.
pub type DeltaSink = Box<dyn Fn(Vec<ChangeDelta>) + Send + Sync>;

/// Storage backend contract.
pub trait RecordStore: Send + Sync {
    /// Short backend name, as used by the registry.
    fn name(&self) -> &'static str;

    /// Directory backing this store, if it is file based.
    fn root(&self) -> Option<&Path> {
        None
    }

    /// Reads every recognized record, sorted per `request`.
    ///
    /// An absent backing directory yields an empty list. This does not touch
    /// the snapshot, so it never hides changes from the next reconciliation.
    fn fetch_all(&self, request: FetchRequest) -> Result<Vec<Record>>;

    /// Reads every recognized record like [`fetch_all`](Self::fetch_all) and
    /// adopts what it read as the snapshot.
    ///
    /// A session starts from this, so whatever the store knew before (its own
    /// earlier writes included) reaches the new record set exactly once.
    fn load(&self, request: FetchRequest) -> Result<Vec<Record>>;

    /// Durably stores a new record. Must be all-or-nothing.
    fn insert(&self, record: &Record) -> Result<()>;

    /// Durably replaces the stored form of a known record.
    ///
    /// Returns [`StorageError::Missing`](crate::StorageError::Missing) when
    /// the record is no longer present.
    fn update(&self, record: &Record) -> Result<()>;

    /// Removes a record. Removing an already-missing record succeeds.
    fn delete(&self, record: &Record) -> Result<()>;

    /// Diffs current contents against the snapshot, adopts the current
    /// contents as the new snapshot and returns the deltas.
    fn detect_external_changes(&self) -> Result<Vec<ChangeDelta>>;

    /// Whether the snapshot currently knows `id`.
    fn contains(&self, id: &RecordId) -> bool {
        self.current(id).is_some()
    }

    /// The version of `id` the snapshot currently holds.
    fn current(&self, id: &RecordId) -> Option<Record>;

    /// Root context slot of this store.
    fn root_context(&self) -> &RootContext;

    /// Registers the recipient of reconciliation deltas, replacing any
    /// previous one.
    fn notify_root_context(&self, sink: DeltaSink) {
        self.root_context().register(sink);
    }

    /// Runs one reconciliation pass and delivers non-empty results to the
    /// root context. Returns the number of deltas found.
    fn refresh(&self) -> Result<usize> {
        self.root_context()
            .run_pass(|| self.detect_external_changes())
    }
}

/// Holder of the single registered delta recipient.
///
/// The slot's mutex also serializes reconciliation passes, so deltas reach
/// the recipient in the order they were discovered even when several threads
/// refresh at once.
#[derive(Default)]
pub struct RootContext {
    sink: Mutex<Option<DeltaSink>>,
}

impl RootContext {
    pub fn register(&self, sink: DeltaSink) {
        *self.slot() = Some(sink);
    }

    pub fn clear(&self) {
        *self.slot() = None;
    }

    pub fn is_registered(&self) -> bool {
        self.slot().is_some()
    }

    /// Runs `detect` and delivers its deltas while holding the slot.
    pub fn run_pass<F>(&self, detect: F) -> Result<usize>
    where
        F: FnOnce() -> Result<Vec<ChangeDelta>>,
    {
        let slot = self.slot();
        let deltas = detect()?;
        let count = deltas.len();

        if count > 0 {
            if let Some(sink) = slot.as_ref() {
                sink(deltas);
            }
        }

        Ok(count)
    }

    fn slot(&self) -> MutexGuard<'_, Option<DeltaSink>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for RootContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootContext")
            .field("registered", &self.is_registered())
            .finish()
    }
}
