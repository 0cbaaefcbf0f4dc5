//! Change notifications for views bound to a session's record set.
//!
//! Notifications are positional: every [`RowChange`] carries the row index
//! in the sorted record set at the moment it was emitted, so a listener that
//! applies them in order can maintain a mirror of the set. All callbacks run
//! on the session's main lane.

use crate::record::Record;
use std::sync::{Arc, Mutex};

/// Position of a row. There is a single section, index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub fn row(row: usize) -> Self {
        Self { section: 0, row }
    }
}

/// Change to the section structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionChange {
    Inserted,
    Deleted,
}

/// Change to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Inserted { at: IndexPath },
    Deleted { at: IndexPath },
    Updated { at: IndexPath },
    /// The record changed and now sorts at a different position.
    Moved { from: IndexPath, to: IndexPath },
}

/// Listener for record set changes.
///
/// Callbacks run on the main lane while the record set is borrowed, so every
/// blocking session call made from inside one (`save`, `insert_new`,
/// `delete`, reads included) returns
/// [`SessionError::Reentrant`](crate::SessionError::Reentrant) and changes
/// nothing. To save in response to a notification, hand the work to another
/// thread and call `save` from there once the callback has returned.
pub trait ChangeObserver: Send {
    fn begin_batch(&mut self) {}

    fn on_section_changed(&mut self, _change: SectionChange, _index: usize) {}

    fn on_row_changed(&mut self, change: RowChange, record: &Record);

    fn end_batch(&mut self) {}
}

/// Handle returned by `add_observer`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered list of registered observers.
#[derive(Default)]
pub(crate) struct ObserverList {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn ChangeObserver>)>,
}

impl ObserverList {
    pub fn add(&mut self, observer: Box<dyn ChangeObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn begin_batch(&mut self) {
        for (_, observer) in &mut self.observers {
            observer.begin_batch();
        }
    }

    pub fn end_batch(&mut self) {
        for (_, observer) in &mut self.observers {
            observer.end_batch();
        }
    }

    pub fn section_changed(&mut self, change: SectionChange, index: usize) {
        for (_, observer) in &mut self.observers {
            observer.on_section_changed(change, index);
        }
    }

    pub fn row_changed(&mut self, change: RowChange, record: &Record) {
        for (_, observer) in &mut self.observers {
            observer.on_row_changed(change, record);
        }
    }
}

/// One notification as seen by a [`ChangeLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    BeginBatch,
    Section(SectionChange, usize),
    Row(RowChange, Record),
    EndBatch,
}

/// Observer that records every notification into a shared log.
///
/// Clones share the same log, so one clone can be registered while another
/// is kept to read the events back.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything logged so far.
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Row events logged so far, without removing them.
    pub fn rows(&self) -> Vec<(RowChange, Record)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ChangeEvent::Row(change, record) => Some((*change, record.clone())),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ChangeEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ChangeEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChangeObserver for ChangeLog {
    fn begin_batch(&mut self) {
        self.push(ChangeEvent::BeginBatch);
    }

    fn on_section_changed(&mut self, change: SectionChange, index: usize) {
        self.push(ChangeEvent::Section(change, index));
    }

    fn on_row_changed(&mut self, change: RowChange, record: &Record) {
        self.push(ChangeEvent::Row(change, record.clone()));
    }

    fn end_batch(&mut self) {
        self.push(ChangeEvent::EndBatch);
    }
}
