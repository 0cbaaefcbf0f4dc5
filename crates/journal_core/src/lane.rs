//! Serial execution lane owning a piece of state.
//!
//! All access to the state happens on one dedicated thread that drains a job
//! queue in order. Other threads either post a job and move on, or post it
//! and block until it has run.

use crate::error::{SessionError, SessionResult};
use std::io;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Owner of the lane thread. Dropping it closes the queue, lets queued jobs
/// finish and joins the thread.
pub(crate) struct MainLane<S> {
    sender: Option<Arc<Sender<Job<S>>>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl<S: Send + 'static> MainLane<S> {
    pub fn spawn(name: &str, state: S) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job<S>>();

        let thread = thread::Builder::new().name(name.to_owned()).spawn(move || {
            let mut state = state;
            for job in receiver {
                job(&mut state);
            }
            debug!("main lane drained");
        })?;

        Ok(Self {
            sender: Some(Arc::new(sender)),
            thread_id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    /// Whether the calling thread is the lane thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queues `job` without waiting for it.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> SessionResult<()> {
        let sender = self.sender.as_ref().ok_or(SessionError::LaneClosed)?;
        sender.send(Box::new(job)).map_err(|_| SessionError::LaneClosed)
    }

    /// Runs `job` on the lane and blocks until it returns its result.
    ///
    /// # Errors
    ///
    /// [`SessionError::Reentrant`] when called from the lane itself,
    /// [`SessionError::LaneClosed`] when the lane is gone or the job panicked.
    pub fn perform_and_wait<R, F>(&self, job: F) -> SessionResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        if self.is_current() {
            return Err(SessionError::Reentrant);
        }

        let (done, wait) = mpsc::sync_channel(1);
        self.post(move |state| {
            let _ = done.send(job(state));
        })?;
        wait.recv().map_err(|_| SessionError::LaneClosed)
    }

    /// Non-owning handle for posting from other components. It does not keep
    /// the lane alive.
    pub fn poster(&self) -> LanePoster<S> {
        LanePoster {
            sender: self.sender.as_ref().map(Arc::downgrade).unwrap_or_default(),
        }
    }
}

impl<S> Drop for MainLane<S> {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!("main lane thread panicked");
            }
        }
    }
}

pub(crate) struct LanePoster<S> {
    sender: Weak<Sender<Job<S>>>,
}

impl<S> LanePoster<S> {
    /// Queues `job` if the lane still exists. Returns whether it was queued.
    pub fn post(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        match self.sender.upgrade() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }
}
