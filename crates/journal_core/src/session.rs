//! Session context: the in-memory record set bound to one store.
//!
//! The record set, pending edits and observer list live on a main lane
//! thread. Public calls are marshalled onto the lane and block
//! until they complete. Reconciliation passes run off the lane, on the
//! calling thread or the poller; their deltas reach the lane through the
//! sink registered with the store.

use crate::config::{Config, SessionConfig};
use crate::delta::ChangeDelta;
use crate::error::{SessionError, SessionResult, StorageError};
use crate::lane::MainLane;
use crate::observer::{ChangeObserver, IndexPath, ObserverId, ObserverList, RowChange, SectionChange};
use crate::poller::Poller;
use crate::record::{FetchRequest, Record, RecordId};
use crate::store::{RecordStore, StoreRegistry};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State owned by the main lane.
struct SessionState {
    store: Arc<dyn RecordStore>,
    request: FetchRequest,
    /// Sorted per `request`.
    records: Vec<Record>,
    /// Staged content edits, flushed by `save`.
    pending: BTreeMap<RecordId, String>,
    observers: ObserverList,
    in_batch: bool,
}

impl SessionState {
    fn new(store: Arc<dyn RecordStore>, request: FetchRequest, mut records: Vec<Record>) -> Self {
        request.sort(&mut records);
        Self {
            store,
            request,
            records,
            pending: BTreeMap::new(),
            observers: ObserverList::default(),
            in_batch: false,
        }
    }

    fn position_of(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id() == id)
    }

    fn open_batch(&mut self) {
        if !self.in_batch {
            self.in_batch = true;
            self.observers.begin_batch();
        }
    }

    fn close_batch(&mut self) {
        if self.in_batch {
            self.in_batch = false;
            self.observers.end_batch();
        }
    }

    fn emit_section(&mut self, change: SectionChange) {
        self.open_batch();
        self.observers.section_changed(change, 0);
    }

    fn emit_row(&mut self, change: RowChange, record: &Record) {
        self.open_batch();
        self.observers.row_changed(change, record);
    }

    fn emit_row_at(&mut self, change: RowChange, index: usize) {
        self.open_batch();
        self.observers.row_changed(change, &self.records[index]);
    }

    /// Inserts at the sorted position without notifying.
    fn place(&mut self, record: Record) -> usize {
        let at = self.request.insertion_index(&self.records, &record);
        self.records.insert(at, record);
        at
    }

    fn announce_inserted(&mut self, at: usize, was_empty: bool) {
        if was_empty {
            self.emit_section(SectionChange::Inserted);
        }
        self.emit_row_at(RowChange::Inserted { at: IndexPath::row(at) }, at);
    }

    fn remove_row(&mut self, at: usize) -> Record {
        let record = self.records.remove(at);
        self.emit_row(RowChange::Deleted { at: IndexPath::row(at) }, &record);
        if self.records.is_empty() {
            self.emit_section(SectionChange::Deleted);
        }
        record
    }

    /// Adopts `record`, inserting it or replacing the held version.
    fn upsert(&mut self, record: Record) {
        let Some(from) = self.position_of(record.id()) else {
            let was_empty = self.records.is_empty();
            let at = self.place(record);
            self.announce_inserted(at, was_empty);
            return;
        };

        if self.records[from] == record {
            return;
        }

        self.records.remove(from);
        let to = self.place(record);
        let change = if from == to {
            RowChange::Updated { at: IndexPath::row(to) }
        } else {
            RowChange::Moved {
                from: IndexPath::row(from),
                to: IndexPath::row(to),
            }
        };
        self.emit_row_at(change, to);
    }

    fn insert_new(&mut self, record: Record) -> SessionResult<Record> {
        let was_empty = self.records.is_empty();
        let at = self.place(record.clone());

        if let Err(e) = self.store.insert(&record) {
            self.records.remove(at);
            warn!(record = %record.id(), error = %e, "insert failed, rolled back");
            return Err(SessionError::SaveFailed(e));
        }

        self.announce_inserted(at, was_empty);
        self.close_batch();
        Ok(record)
    }

    fn delete(&mut self, record: &Record) -> SessionResult<()> {
        self.store.delete(record).map_err(SessionError::SaveFailed)?;

        self.pending.remove(record.id());
        if let Some(at) = self.position_of(record.id()) {
            self.remove_row(at);
        }
        self.close_batch();
        Ok(())
    }

    fn stage_content(&mut self, id: RecordId, content: String) -> SessionResult<()> {
        if self.position_of(&id).is_none() {
            return Err(SessionError::RecordNotFound(id));
        }
        self.pending.insert(id, content);
        Ok(())
    }

    /// Flushes pending edits in id order, stopping at the first failure.
    fn save(&mut self) -> SessionResult<()> {
        let ids: Vec<RecordId> = self.pending.keys().cloned().collect();
        let mut result = Ok(());

        for id in ids {
            let (Some(at), Some(content)) = (self.position_of(&id), self.pending.get(&id)) else {
                self.pending.remove(&id);
                continue;
            };

            let edited = self.records[at].with_content(content.clone());
            if let Err(e) = self.store.update(&edited) {
                warn!(record = %id, error = %e, "save failed, edit stays pending");
                result = Err(SessionError::SaveFailed(e));
                break;
            }

            self.pending.remove(&id);
            self.upsert(edited);
        }

        self.close_batch();
        result
    }

    fn apply_deltas(&mut self, deltas: Vec<ChangeDelta>) {
        for delta in deltas {
            self.apply_driver_delta(delta);
        }
        self.close_batch();
    }

    /// Applies one reconciliation delta, dropping it if the store has since
    /// observed a different state for the record.
    ///
    /// A delta is only current while the store still holds exactly the
    /// version it carries; a save or a later pass that landed first wins.
    fn apply_driver_delta(&mut self, delta: ChangeDelta) {
        let stale = match &delta {
            ChangeDelta::Deleted(id) => self.store.contains(id),
            ChangeDelta::Inserted(record) | ChangeDelta::Updated(record) => {
                self.store.current(record.id()).as_ref() != Some(record)
            }
        };
        if stale {
            debug!(record = %delta.id(), "dropping stale delta");
            return;
        }

        match delta {
            ChangeDelta::Deleted(id) => {
                if self.pending.remove(&id).is_some() {
                    debug!(record = %id, "discarding pending edit of removed record");
                }
                if let Some(at) = self.position_of(&id) {
                    self.remove_row(at);
                }
            }
            ChangeDelta::Inserted(record) | ChangeDelta::Updated(record) => {
                if self.pending.contains_key(record.id()) {
                    debug!(record = %record.id(), "record changed in storage while an edit is pending");
                }
                self.upsert(record);
            }
        }
    }
}

/// A live, observable view of the records in one store.
///
/// # Examples
///
/// ```
/// use journal_core::{ChangeLog, MemoryStore, SessionContext};
/// use chrono::Utc;
/// use std::sync::Arc;
///
/// let session = SessionContext::open(Arc::new(MemoryStore::new())).unwrap();
/// let log = ChangeLog::new();
/// session.add_observer(log.clone()).unwrap();
///
/// let record = session.insert_new("hello", Utc::now()).unwrap();
/// assert_eq!(session.records().unwrap(), vec![record.clone()]);
///
/// session.delete(&record).unwrap();
/// assert!(session.is_empty().unwrap());
/// assert_eq!(log.rows().len(), 2);
/// ```
pub struct SessionContext {
    store: Arc<dyn RecordStore>,
    lane: MainLane<SessionState>,
    poller: Option<Poller>,
}

impl SessionContext {
    /// Opens a session that reconciles only when [`refresh`](Self::refresh)
    /// is called.
    pub fn open(store: Arc<dyn RecordStore>) -> SessionResult<Self> {
        Self::with_config(store, &SessionConfig::default())
    }

    /// Creates the configured backend through `registry` and opens a session
    /// over it.
    pub fn from_config(config: &Config, registry: &StoreRegistry) -> SessionResult<Self> {
        let store = registry.create(&config.storage)?;
        Self::with_config(store, &config.session)
    }

    /// Opens a session over `store`.
    ///
    /// The initial record set is everything the store holds, read through
    /// [`RecordStore::load`] so the store's snapshot and the session agree
    /// from the start. This holds for a store that was written to before,
    /// including one handed over from an earlier session.
    ///
    /// # Errors
    ///
    /// [`SessionError::Storage`] if the store cannot be read. Nothing is left
    /// running in that case.
    pub fn with_config(store: Arc<dyn RecordStore>, config: &SessionConfig) -> SessionResult<Self> {
        let request = FetchRequest::default();
        let initial = store.load(request)?;
        let count = initial.len();

        let state = SessionState::new(Arc::clone(&store), request, initial);
        let lane = MainLane::spawn("journal-main", state).map_err(StorageError::Io)?;

        let poster = lane.poster();
        store.notify_root_context(Box::new(move |deltas| {
            let count = deltas.len();
            if !poster.post(move |state: &mut SessionState| state.apply_deltas(deltas)) {
                warn!(count, "session closed, dropping deltas");
            }
        }));

        let poller = match config.poll_interval() {
            Some(interval) => match Poller::spawn(Arc::clone(&store), interval) {
                Ok(poller) => Some(poller),
                Err(e) => {
                    store.root_context().clear();
                    return Err(StorageError::Io(e).into());
                }
            },
            None => None,
        };

        info!(backend = store.name(), records = count, "session opened");
        Ok(Self { store, lane, poller })
    }

    /// Backing store of this session.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Creates and persists a new record. Observers see it only once it is
    /// durable.
    pub fn insert_new(
        &self,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> SessionResult<Record> {
        let record = Record::new(content, timestamp);
        self.lane.perform_and_wait(move |state| state.insert_new(record))?
    }

    /// Deletes `record` from storage, then from the set. Deleting a record
    /// that is already gone succeeds.
    pub fn delete(&self, record: &Record) -> SessionResult<()> {
        let record = record.clone();
        self.lane.perform_and_wait(move |state| state.delete(&record))?
    }

    /// Stages new content for a held record; applied by [`save`](Self::save).
    pub fn stage_content(&self, id: &RecordId, content: impl Into<String>) -> SessionResult<()> {
        let id = id.clone();
        let content = content.into();
        self.lane.perform_and_wait(move |state| state.stage_content(id, content))?
    }

    /// Whether staged edits are waiting for [`save`](Self::save).
    pub fn has_changes(&self) -> SessionResult<bool> {
        self.lane.perform_and_wait(|state| !state.pending.is_empty())
    }

    /// Makes every staged edit durable.
    ///
    /// Callable from any thread except the main lane itself.
    ///
    /// # Errors
    ///
    /// [`SessionError::SaveFailed`] on the first edit that cannot be written;
    /// that edit and the ones after it stay pending.
    /// [`SessionError::Reentrant`] when called from an observer callback.
    pub fn save(&self) -> SessionResult<()> {
        self.lane.perform_and_wait(|state| state.save())?
    }

    /// Runs a reconciliation pass and waits until its deltas are applied.
    /// Returns the number of deltas found.
    pub fn refresh(&self) -> SessionResult<usize> {
        if self.lane.is_current() {
            return Err(SessionError::Reentrant);
        }
        let count = self.store.refresh()?;
        self.lane.perform_and_wait(|_| ())?;
        Ok(count)
    }

    /// Snapshot of the record set in sort order.
    pub fn records(&self) -> SessionResult<Vec<Record>> {
        self.lane.perform_and_wait(|state| state.records.clone())
    }

    pub fn len(&self) -> SessionResult<usize> {
        self.lane.perform_and_wait(|state| state.records.len())
    }

    pub fn is_empty(&self) -> SessionResult<bool> {
        self.lane.perform_and_wait(|state| state.records.is_empty())
    }

    pub fn get(&self, id: &RecordId) -> SessionResult<Option<Record>> {
        let id = id.clone();
        self.lane
            .perform_and_wait(move |state| state.position_of(&id).map(|at| state.records[at].clone()))
    }

    pub fn position_of(&self, id: &RecordId) -> SessionResult<Option<usize>> {
        let id = id.clone();
        self.lane.perform_and_wait(move |state| state.position_of(&id))
    }

    pub fn add_observer(&self, observer: impl ChangeObserver + 'static) -> SessionResult<ObserverId> {
        let observer: Box<dyn ChangeObserver> = Box::new(observer);
        self.lane.perform_and_wait(move |state| state.observers.add(observer))
    }

    /// Unregisters an observer. Returns whether it was registered.
    pub fn remove_observer(&self, id: ObserverId) -> SessionResult<bool> {
        self.lane.perform_and_wait(move |state| state.observers.remove(id))
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.poller.take();
        self.store.root_context().clear();
        debug!(backend = self.store.name(), "session closed");
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("backend", &self.store.name())
            .field("polling", &self.poller.is_some())
            .finish()
    }
}
