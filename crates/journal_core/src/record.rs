//! The journal entry record and its sort contract.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a record.
///
/// The identifier doubles as the stem of the backing file name, so it must be
/// a single non-hidden path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generates a fresh, globally unique identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().to_uppercase())
    }

    /// Validates an identifier taken from a file stem or user input.
    ///
    /// Returns `None` for empty strings, hidden names and anything containing
    /// a path separator or line break.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && !raw.starts_with('.')
            && !raw.contains(|c: char| matches!(c, '/' | '\\' | '\n' | '\r' | '\0'));
        valid.then(|| Self(raw.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A journal entry.
///
/// `id` and `timestamp` are fixed at creation; `content` changes only through
/// the owning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Record {
    /// Creates a record with a freshly generated identifier.
    ///
    /// The timestamp is truncated to whole seconds, the resolution of the
    /// file format.
    pub fn new(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::with_id(RecordId::generate(), content, timestamp)
    }

    /// Creates a record with a known identifier.
    pub fn with_id(id: RecordId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            content: content.into(),
            timestamp: timestamp.trunc_subsecs(0),
        }
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns a copy of this record carrying new content.
    pub(crate) fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            content: content.into(),
            timestamp: self.timestamp,
        }
    }
}

/// Field a fetch is sorted by. Timestamp is the only sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Timestamp,
}

/// Direction of the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Parameters of a `fetch_all` call.
///
/// The default request is timestamp descending. Ties are always broken by
/// identifier ascending so the order is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchRequest {
    pub key: SortKey,
    pub order: SortOrder,
}

impl FetchRequest {
    pub fn ascending() -> Self {
        Self {
            key: SortKey::Timestamp,
            order: SortOrder::Ascending,
        }
    }

    /// Compares two records according to this request.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let by_key = match self.key {
            SortKey::Timestamp => a.timestamp.cmp(&b.timestamp),
        };
        let by_key = match self.order {
            SortOrder::Ascending => by_key,
            SortOrder::Descending => by_key.reverse(),
        };
        by_key.then_with(|| a.id.cmp(&b.id))
    }

    /// Sorts records in place.
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }

    /// Index at which `record` belongs in an already sorted slice.
    pub fn insertion_index(&self, records: &[Record], record: &Record) -> usize {
        records.partition_point(|existing| self.compare(existing, record) == Ordering::Less)
    }
}
