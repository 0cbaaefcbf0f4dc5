//! Journal Core Library
//!
//! Storage for timestamped journal entries kept as one text file per entry
//! in a shared directory, providing:
//! - Atomic, crash-safe writes
//! - Reconciliation with changes made by other processes
//! - A live session with ordered change notifications
//! - A concurrent mutator for exercising all of the above
//!
//! # Quick Start
//!
//! ```
//! use journal_core::{DirectoryStore, FetchRequest, RecordStore, SessionContext};
//! use chrono::Utc;
//! use std::sync::Arc;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = Arc::new(DirectoryStore::open(tmp.path().join("Journal")).unwrap());
//! let session = SessionContext::open(store.clone()).unwrap();
//!
//! let entry = session.insert_new("hello", Utc::now()).unwrap();
//! assert_eq!(store.fetch_all(FetchRequest::default()).unwrap(), vec![entry]);
//! ```
//!
//! # Features
//!
//! ## Reconciliation
//!
//! Files written by other tools are picked up on the next pass:
//!
//! ```
//! use journal_core::{codec, ChangeDelta, DirectoryStore, Record, RecordStore};
//! use chrono::Utc;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = DirectoryStore::open(tmp.path()).unwrap();
//!
//! let outside = Record::new("written elsewhere", Utc::now());
//! std::fs::write(store.record_path(outside.id()), codec::encode(&outside)).unwrap();
//!
//! assert_eq!(store.detect_external_changes().unwrap(), vec![ChangeDelta::Inserted(outside)]);
//! assert!(store.detect_external_changes().unwrap().is_empty());
//! ```
//!
//! ## Configuration
//!
//! Backends are created by name from an explicit registry:
//!
//! ```
//! use journal_core::{Config, SessionContext, StoreRegistry};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut config = Config::default();
//! config.storage.data_dir = Some(tmp.path().display().to_string());
//!
//! let session = SessionContext::from_config(&config, &StoreRegistry::with_defaults()).unwrap();
//! assert!(session.is_empty().unwrap());
//! ```

pub mod codec;
mod config;
mod delta;
mod error;
mod fsutil;
mod hammer;
mod lane;
mod observer;
mod poller;
mod record;
mod session;
mod snapshot;
mod store;

pub use config::{Config, HammerConfig, SessionConfig, StorageConfig, DEFAULT_DIR_NAME};
pub use delta::ChangeDelta;
pub use error::{Result, SessionError, SessionResult, StorageError};
pub use hammer::{Hammer, HammerReport, HammerRun};
pub use observer::{
    ChangeEvent, ChangeLog, ChangeObserver, IndexPath, ObserverId, RowChange, SectionChange,
};
pub use record::{FetchRequest, Record, RecordId, SortKey, SortOrder};
pub use session::SessionContext;
pub use store::{
    DeltaSink, DirectoryStore, MemoryStore, RecordStore, RootContext, StoreFactory, StoreRegistry,
};
