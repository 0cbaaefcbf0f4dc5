//! Concurrent mutator that churns a storage directory from the outside.
//!
//! The hammer behaves like an uncoordinated external tool: it writes record
//! files with plain (non-atomic) writes, ignores the session lock and deletes
//! files on its own schedule. It exists to exercise reconciliation.

use crate::codec;
use crate::config::HammerConfig;
use crate::error::Result;
use crate::fsutil;
use crate::record::{Record, RecordId};
use chrono::Utc;
use rand::Rng;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HammerReport {
    pub created: usize,
    pub deleted: usize,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicUsize,
    deleted: AtomicUsize,
}

/// Handle to the threads of one hammer or empty run.
#[derive(Debug)]
pub struct HammerRun {
    threads: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl HammerRun {
    /// Whether every thread of the run has finished.
    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(JoinHandle::is_finished)
    }

    /// Totals so far.
    pub fn progress(&self) -> HammerReport {
        HammerReport {
            created: self.counters.created.load(Ordering::SeqCst),
            deleted: self.counters.deleted.load(Ordering::SeqCst),
        }
    }

    /// Waits for every thread and returns the totals.
    pub fn join(self) -> HammerReport {
        for thread in self.threads {
            if thread.join().is_err() {
                warn!("hammer thread panicked");
            }
        }
        HammerReport {
            created: self.counters.created.load(Ordering::SeqCst),
            deleted: self.counters.deleted.load(Ordering::SeqCst),
        }
    }
}

/// External mutator bound to one directory.
#[derive(Debug, Clone)]
pub struct Hammer {
    dir: PathBuf,
    config: HammerConfig,
}

impl Hammer {
    pub fn new(dir: impl Into<PathBuf>, config: HammerConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Starts `tasks` independent writers. Each creates its files after a
    /// random start delay and deletes each one after a further random delay.
    pub fn hammer(&self) -> Result<HammerRun> {
        fs::create_dir_all(&self.dir)?;
        let counters = Arc::new(Counters::default());
        info!(
            dir = %self.dir.display(),
            tasks = self.config.tasks,
            files_per_task = self.config.files_per_task,
            "hammering directory"
        );

        let mut threads = Vec::with_capacity(self.config.tasks);
        for task in 0..self.config.tasks {
            let dir = self.dir.clone();
            let config = self.config.clone();
            let counters = Arc::clone(&counters);
            let thread = thread::Builder::new()
                .name(format!("journal-hammer-{}", task))
                .spawn(move || run_task(&dir, &config, &counters))?;
            threads.push(thread);
        }

        Ok(HammerRun { threads, counters })
    }

    /// After the configured delay, deletes every recognized record file.
    pub fn empty(&self) -> Result<HammerRun> {
        let counters = Arc::new(Counters::default());
        let dir = self.dir.clone();
        let delay = Duration::from_millis(self.config.empty_delay_ms);
        info!(dir = %self.dir.display(), "emptying directory");

        let thread = thread::Builder::new()
            .name("journal-empty".to_owned())
            .spawn({
                let counters = Arc::clone(&counters);
                move || {
                    thread::sleep(delay);
                    empty_dir(&dir, &counters);
                }
            })?;

        Ok(HammerRun {
            threads: vec![thread],
            counters,
        })
    }
}

/// Uniform delay in `[0, max)`; zero when `max` is zero.
fn jitter<R: Rng>(rng: &mut R, max_ms: u64) -> Duration {
    if max_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rng.gen_range(0..max_ms))
    }
}

fn run_task(dir: &Path, config: &HammerConfig, counters: &Counters) {
    let mut rng = rand::thread_rng();
    thread::sleep(jitter(&mut rng, config.max_start_delay_ms));

    let mut deletions = Vec::with_capacity(config.files_per_task);
    for _ in 0..config.files_per_task {
        let id = RecordId::generate();
        let age_secs = rng.gen_range(0..=config.date_range_secs.min(u64::from(u32::MAX)));
        let timestamp = Utc::now() - chrono::Duration::seconds(age_secs as i64);
        let record = Record::with_id(id.clone(), format!("File {}", id), timestamp);
        let path = dir.join(codec::file_name(&id));

        match write_plain(&path, &codec::encode(&record)) {
            Ok(()) => {
                counters.created.fetch_add(1, Ordering::SeqCst);
                let due = Instant::now() + jitter(&mut rng, config.max_delete_delay_ms);
                deletions.push((due, path));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "hammer write failed"),
        }
    }

    deletions.sort_by_key(|(due, _)| *due);
    for (due, path) in deletions {
        thread::sleep(due.saturating_duration_since(Instant::now()));
        remove_counted(&path, counters);
    }
}

/// Writes `bytes` the way an unaware tool would: in place, one line at a
/// time, so a concurrent reader can observe a partial file.
fn write_plain(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |newline| newline + 1);

    let mut file = File::create(path)?;
    file.write_all(&bytes[..split])?;
    file.flush()?;
    file.write_all(&bytes[split..])?;
    file.flush()
}

fn empty_dir(dir: &Path, counters: &Counters) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "nothing to empty");
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_str().and_then(codec::parse_file_name).is_some() {
            remove_counted(&entry.path(), counters);
        }
    }
}

fn remove_counted(path: &Path, counters: &Counters) {
    match fsutil::remove_if_present(path) {
        Ok(true) => {
            counters.deleted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(false) => debug!(path = %path.display(), "already removed"),
        Err(e) => warn!(path = %path.display(), error = %e, "hammer delete failed"),
    }
}
