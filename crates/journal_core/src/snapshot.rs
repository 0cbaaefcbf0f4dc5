//! A store's private view of what it last saw on disk.

use crate::delta::ChangeDelta;
use crate::record::{Record, RecordId};
use std::collections::BTreeMap;

/// What the store knows about one record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SnapshotEntry {
    /// BLAKE3 digest of the file bytes; the modification marker.
    pub digest: blake3::Hash,
    pub record: Record,
}

impl SnapshotEntry {
    pub fn new(record: Record, bytes: &[u8]) -> Self {
        Self {
            digest: blake3::hash(bytes),
            record,
        }
    }
}

/// Last-known mapping from record id to file state.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    entries: BTreeMap<RecordId, SnapshotEntry>,
}

impl Snapshot {
    pub fn contains(&self, id: &RecordId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &RecordId) -> Option<&SnapshotEntry> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, entry: SnapshotEntry) {
        self.entries.insert(entry.record.id().clone(), entry);
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<SnapshotEntry> {
        self.entries.remove(id)
    }

    /// Computes the deltas that turn this snapshot into `observed` and adopts
    /// `observed` as the new state.
    ///
    /// Deletions come first, then insertions and updates, each in id order.
    /// A file replaced under the same id is one `Updated`. A rewrite that
    /// decodes to an equal record (different bytes, same meaning) updates the
    /// digest silently.
    pub fn reconcile(&mut self, observed: BTreeMap<RecordId, SnapshotEntry>) -> Vec<ChangeDelta> {
        let mut deltas: Vec<ChangeDelta> = self
            .entries
            .keys()
            .filter(|id| !observed.contains_key(*id))
            .map(|id| ChangeDelta::Deleted(id.clone()))
            .collect();

        for (id, entry) in &observed {
            match self.entries.get(id) {
                None => deltas.push(ChangeDelta::Inserted(entry.record.clone())),
                Some(known) if known.digest != entry.digest && known.record != entry.record => {
                    deltas.push(ChangeDelta::Updated(entry.record.clone()))
                }
                Some(_) => {}
            }
        }

        self.entries = observed;
        deltas
    }

    /// Replaces the whole snapshot without computing deltas.
    pub fn reset(&mut self, observed: BTreeMap<RecordId, SnapshotEntry>) {
        self.entries = observed;
    }
}
