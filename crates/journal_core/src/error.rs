//! Error types for journal_core operations.

use crate::record::RecordId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`RecordStore`](crate::RecordStore).
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error during a filesystem operation (unreadable directory,
    /// permissions, disk full).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the backing file of a record failed.
    #[error("failed to write record {id}: {source}")]
    WriteFailed {
        /// Record being written
        id: RecordId,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Removing the backing file of a record failed.
    #[error("failed to delete record {id}: {source}")]
    DeleteFailed {
        /// Record being deleted
        id: RecordId,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The store no longer knows the record (removed outside the session).
    #[error("record not found in storage: {0}")]
    Missing(RecordId),

    /// A record file could not be parsed.
    #[error("invalid record at {}: {}", path.display(), reason)]
    InvalidRecord {
        /// Path of the offending file
        path: PathBuf,
        /// Description of what's invalid
        reason: String,
    },

    /// Configuration error (loading, parsing, unresolvable directory).
    #[error("configuration error: {0}")]
    Config(String),

    /// Another session owns the storage directory.
    #[error("storage directory locked by another session: {}", .0.display())]
    Locked(PathBuf),

    /// No backend registered under the requested name.
    #[error("unknown storage backend: {0}")]
    UnknownBackend(String),
}

impl StorageError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Locked(_) => Some(
                "Another journal session is using this directory. Close it, or remove .journal.lock if that process is dead.",
            ),
            Self::Missing(_) => Some("The entry was removed outside this session. Run 'journal list' to refresh."),
            Self::UnknownBackend(_) => Some("Use 'directory' or 'memory' for storage.backend."),
            Self::Config(_) => Some("Check the config file, or pass --data-dir explicitly."),
            Self::InvalidRecord { .. } => Some("The file is ignored by reconciliation; fix or remove it by hand."),
            _ => None,
        }
    }
}

/// Errors raised by a [`SessionContext`](crate::SessionContext).
#[derive(Error, Debug)]
pub enum SessionError {
    /// A logical mutation could not be made durable. The in-memory record
    /// set is unchanged when this is returned.
    #[error("save failed: {0}")]
    SaveFailed(#[source] StorageError),

    /// Storage failure outside of a save (startup, fetch, reconciliation).
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The session holds no record with this id.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// The main lane has shut down.
    #[error("session main lane is closed")]
    LaneClosed,

    /// A blocking session call was made from the main lane itself.
    #[error("blocking session call issued from the main lane")]
    Reentrant,
}

impl SessionError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::SaveFailed(e) | Self::Storage(e) => e.recovery_suggestion(),
            Self::RecordNotFound(_) => Some("Run 'journal list' to see the current entry ids."),
            Self::Reentrant => Some("Defer the call until the observer callback has returned."),
            _ => None,
        }
    }
}

/// Convenience Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Convenience Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
