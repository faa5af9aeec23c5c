//! Time-bounded backend calls on one long-lived thread per backend.
//!
//! The worker thread is spawned on the first bounded call and reused after
//! that. A call that outlives its timeout keeps the worker busy; until it
//! returns, further calls to that backend fail fast with
//! [`BackendError::Unavailable`] instead of queueing behind it. A hung store
//! therefore holds one thread, never one per call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SendError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::storage::{BackendError, BackendId, BackendResult, RootBackend};

/// Runs against the backend; returns `false` if nobody was waiting for the result.
type Job = Box<dyn FnOnce(&dyn RootBackend) -> bool + Send>;

/// A backend plus the thread its bounded calls run on.
pub struct BackendWorker {
    backend: Arc<dyn RootBackend>,
    id: BackendId,
    jobs: Mutex<Option<Sender<Job>>>,
    busy: Arc<AtomicBool>,
}

/// Marks the worker idle when dropped, including while unwinding.
struct Idle<'a>(&'a AtomicBool);

impl Drop for Idle<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BackendWorker {
    pub fn new(backend: Arc<dyn RootBackend>) -> Self {
        let id = backend.id();
        Self {
            backend,
            id,
            jobs: Mutex::new(None),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a previous call is still running on the worker.
    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Runs `op` on the worker thread and waits at most `timeout` for it.
    pub fn call<T, F>(&self, timeout: Duration, op: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RootBackend) -> BackendResult<T> + Send + 'static,
    {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(BackendError::Unavailable(format!(
                "backend {} is still running a call that timed out",
                self.id
            )));
        }

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let busy = Arc::clone(&self.busy);
        let job: Job = Box::new(move |backend| {
            // Idle before replying (or before the reply channel drops on a
            // panic), so a caller never sees a busy worker after its result.
            let idle = Idle(&busy);
            let result = op(backend);
            drop(idle);
            reply_tx.send(result).is_ok()
        });
        if let Err(err) = self.submit(job) {
            self.busy.store(false, Ordering::SeqCst);
            return Err(err);
        }

        match reply_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BackendError::Timeout {
                millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(BackendError::Unavailable(format!(
                "backend {} worker exited without a result",
                self.id
            ))),
        }
    }

    fn submit(&self, job: Job) -> BackendResult<()> {
        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| BackendError::Unavailable("worker queue poisoned".to_string()))?;

        let job = match jobs.as_ref() {
            Some(sender) => match sender.send(job) {
                Ok(()) => return Ok(()),
                // The previous worker died; start a new one below.
                Err(SendError(job)) => job,
            },
            None => job,
        };

        let sender = self.spawn()?;
        sender.send(job).map_err(|_| {
            BackendError::Unavailable(format!("backend {} worker exited at start", self.id))
        })?;
        *jobs = Some(sender);
        Ok(())
    }

    fn spawn(&self) -> BackendResult<Sender<Job>> {
        let (tx, rx) = mpsc::channel::<Job>();
        let backend = Arc::clone(&self.backend);
        let id = self.id.clone();
        thread::Builder::new()
            .name(format!("secureudid-{id}"))
            .spawn(move || {
                for job in rx {
                    if !job(backend.as_ref()) {
                        log::warn!("backend {id} finished a call after its caller timed out");
                    }
                }
            })
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        log::debug!("started worker for backend {}", self.id);
        Ok(tx)
    }
}
