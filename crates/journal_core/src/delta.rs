//! Change deltas reported by a store's reconciliation pass.

use crate::record::{Record, RecordId};

/// One difference between a store's last-known state and what it observes now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDelta {
    /// A record appeared that the store did not know about.
    Inserted(Record),
    /// A known record's backing file now holds different data.
    Updated(Record),
    /// A known record's backing file is gone.
    Deleted(RecordId),
}

impl ChangeDelta {
    /// Identifier of the record this delta concerns.
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Inserted(record) | Self::Updated(record) => record.id(),
            Self::Deleted(id) => id,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }
}
