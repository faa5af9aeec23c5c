//! Root resolution across redundant backends.
//!
//! Every call runs the same sequence under the resolution lock:
//!
//! 1. Read every backend in priority (registration) order.
//! 2. If no backend could be read at all, fail with
//!    [`SecureUdidError::BackendsUnreadable`].
//! 3. If at least one backend holds a record, pick the authoritative one with
//!    the configured [`ReconcilePolicy`] and write it into every backend that
//!    is empty, unreadable or divergent. Those writes are best effort.
//! 4. Otherwise generate a fresh root and write it everywhere. If not a single
//!    write lands, fail with [`SecureUdidError::PersistenceUnavailable`].
//!
//! Nothing is cached between calls, so a store wiped or edited behind our back
//! is noticed and healed on the next call.
//!
//! The lock is process-wide per backend location (see
//! [`location_lock`]), plus an optional [`StorageLock`] file for hosts with
//! several processes. A freshly created root is read back before it is
//! returned; if a writer outside those locks got there first, the manager
//! yields to whatever the policy picks from the stores.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::entropy::EntropySource;
use crate::root::RootIdentifier;
use crate::storage::{
    location_lock, BackendError, BackendId, BackendResult, RootBackend, RootRecord, StorageLock,
};
use crate::worker::BackendWorker;
use crate::{ReconcilePolicy, SecureUdidError};

/// How a call arrived at its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    /// No backend held a root; a new one was generated and persisted.
    Created,
    /// Every backend holding a root agreed on it.
    Adopted,
    /// Backends held different roots; the policy picked one.
    Reconciled,
}

/// Outcome of one resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    record: RootRecord,
    kind: ResolutionKind,
    source: Option<BackendId>,
    written: Vec<BackendId>,
    failed: Vec<BackendId>,
}

impl Resolution {
    /// The resolved root.
    #[must_use]
    pub const fn root(&self) -> &RootIdentifier {
        self.record.root()
    }

    /// The resolved record, including its creation time.
    #[must_use]
    pub const fn record(&self) -> &RootRecord {
        &self.record
    }

    /// How the root was arrived at.
    #[must_use]
    pub const fn kind(&self) -> ResolutionKind {
        self.kind
    }

    /// Backend the authoritative record was read from. `None` when created.
    #[must_use]
    pub const fn source(&self) -> Option<&BackendId> {
        self.source.as_ref()
    }

    /// Backends written during this call (creation or self-healing).
    #[must_use]
    pub fn written(&self) -> &[BackendId] {
        &self.written
    }

    /// Backends whose write failed during this call.
    #[must_use]
    pub fn failed(&self) -> &[BackendId] {
        &self.failed
    }
}

struct Observation {
    index: usize,
    id: BackendId,
    read: BackendResult<Option<RootRecord>>,
}

impl Observation {
    fn record(&self) -> Option<&RootRecord> {
        self.read.as_ref().ok().and_then(Option::as_ref)
    }
}

/// Owns the backends and serializes root resolution.
pub struct RootManager {
    backends: Vec<Arc<dyn RootBackend>>,
    workers: Vec<BackendWorker>,
    entropy: Arc<dyn EntropySource>,
    policy: ReconcilePolicy,
    timeout: Option<Duration>,
    file_lock: Option<StorageLock>,
    /// Process-wide location locks, in sorted location order.
    locks: Vec<Arc<Mutex<()>>>,
}

impl RootManager {
    /// Creates a manager over `backends`, highest priority first.
    pub fn new(
        backends: Vec<Arc<dyn RootBackend>>,
        entropy: Arc<dyn EntropySource>,
        policy: ReconcilePolicy,
    ) -> Self {
        let mut locations: Vec<String> = backends.iter().map(|b| b.location()).collect();
        locations.sort();
        locations.dedup();
        let locks = locations
            .iter()
            .map(|location| location_lock(location))
            .collect();
        let workers = backends
            .iter()
            .map(|backend| BackendWorker::new(Arc::clone(backend)))
            .collect();
        Self {
            backends,
            workers,
            entropy,
            policy,
            timeout: None,
            file_lock: None,
            locks,
        }
    }

    /// Bounds every backend call by `timeout`.
    ///
    /// Bounded calls run on one worker thread per backend. A backend still
    /// busy with a call that timed out is skipped until that call returns.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Additionally serializes resolution across processes with `lock`.
    #[must_use]
    pub fn with_file_lock(mut self, lock: StorageLock) -> Self {
        self.file_lock = Some(lock);
        self
    }

    /// Backend ids in priority order.
    #[must_use]
    pub fn backend_ids(&self) -> Vec<BackendId> {
        self.backends.iter().map(|backend| backend.id()).collect()
    }

    /// Resolves the root, creating or healing backends as needed.
    ///
    /// `now` is the creation timestamp stamped on a newly generated root.
    ///
    /// # Errors
    ///
    /// - [`SecureUdidError::LockUnavailable`] if the lock file cannot be taken
    /// - [`SecureUdidError::BackendsUnreadable`] if every read failed
    /// - [`SecureUdidError::EntropyUnavailable`] if a new root is needed and
    ///   the entropy source fails
    /// - [`SecureUdidError::PersistenceUnavailable`] if a new root could not
    ///   be written anywhere
    pub fn resolve(&self, now: u64) -> Result<Resolution, SecureUdidError> {
        // Sorted acquisition keeps managers with overlapping locations
        // deadlock free. The mutexes guard no data, so poisoning is ignored.
        #[allow(clippy::collection_is_never_read)]
        let _guards: Vec<_> = self
            .locks
            .iter()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();
        let _file_guard = self.file_lock.as_ref().map(StorageLock::lock).transpose()?;

        let observations = self.observe();

        if observations.iter().all(|observation| observation.read.is_err()) {
            let reasons = describe_failures(
                observations
                    .iter()
                    .filter_map(|o| o.read.as_ref().err().map(|err| (&o.id, err))),
            );
            log::error!("no backend could be read: {reasons}");
            return Err(SecureUdidError::BackendsUnreadable(reasons));
        }

        match self.authoritative(&observations) {
            Some((index, record)) => Ok(self.adopt(&observations, index, record)),
            None => self.create(&observations, now),
        }
    }

    fn authoritative(&self, observations: &[Observation]) -> Option<(usize, RootRecord)> {
        select_authoritative(self.policy, observations).and_then(|index| {
            observations[index]
                .record()
                .cloned()
                .map(|record| (index, record))
        })
    }

    fn observe(&self) -> Vec<Observation> {
        self.backends
            .iter()
            .enumerate()
            .map(|(index, backend)| {
                let id = backend.id();
                let read = self.call_bounded(index, |b| b.read());
                match &read {
                    Ok(Some(record)) => log::debug!(
                        "backend {id} holds root {}",
                        record.root().fingerprint()
                    ),
                    Ok(None) => log::debug!("backend {id} holds no root"),
                    Err(err) => log::warn!("backend {id} read failed: {err}"),
                }
                Observation { index, id, read }
            })
            .collect()
    }

    fn adopt(
        &self,
        observations: &[Observation],
        index: usize,
        record: RootRecord,
    ) -> Resolution {
        let winner = &observations[index];

        let diverged = observations
            .iter()
            .filter_map(Observation::record)
            .any(|other| other.root() != record.root());
        let kind = if diverged {
            log::warn!(
                "backends disagree on the root; {} wins under {} policy",
                winner.id,
                self.policy
            );
            ResolutionKind::Reconciled
        } else {
            ResolutionKind::Adopted
        };

        let stale = observations
            .iter()
            .filter(|o| o.record().is_none_or(|held| held != &record));
        let (written, failed) = self.write_all(stale, &record);
        if !written.is_empty() {
            log::info!(
                "healed root {} into {}",
                record.root().fingerprint(),
                join_ids(&written)
            );
        }

        Resolution {
            record,
            kind,
            source: Some(winner.id.clone()),
            written,
            failed,
        }
    }

    fn create(
        &self,
        observations: &[Observation],
        now: u64,
    ) -> Result<Resolution, SecureUdidError> {
        let root = self.entropy.generate()?;
        let record = RootRecord::new(root, now);
        let (written, failed) = self.write_all(observations.iter(), &record);

        if written.is_empty() {
            let reasons = join_ids(&failed);
            log::error!("new root could not be persisted to any backend: {reasons}");
            return Err(SecureUdidError::PersistenceUnavailable(format!(
                "every backend rejected the new root: {reasons}"
            )));
        }

        // A writer outside our locks may have created a root at the same
        // time. Whatever the stores now hold wins over our copy.
        let settled = self.observe();
        if let Some((index, held)) = self
            .authoritative(&settled)
            .filter(|(_, held)| held.root() != record.root())
        {
            log::warn!(
                "root {} lost a concurrent creation to {}; adopting it",
                record.root().fingerprint(),
                held.root().fingerprint()
            );
            return Ok(self.adopt(&settled, index, held));
        }

        log::info!(
            "created root {} in {}",
            record.root().fingerprint(),
            join_ids(&written)
        );
        Ok(Resolution {
            record,
            kind: ResolutionKind::Created,
            source: None,
            written,
            failed,
        })
    }

    fn write_all<'a>(
        &self,
        targets: impl Iterator<Item = &'a Observation>,
        record: &RootRecord,
    ) -> (Vec<BackendId>, Vec<BackendId>) {
        let mut written = Vec::new();
        let mut failed = Vec::new();
        for observation in targets {
            let copy = record.clone();
            match self.call_bounded(observation.index, move |b| b.write(&copy)) {
                Ok(()) => written.push(observation.id.clone()),
                Err(err) => {
                    log::warn!("backend {} write failed: {err}", observation.id);
                    failed.push(observation.id.clone());
                }
            }
        }
        (written, failed)
    }

    /// Runs `op` against backend `index`, giving up after the configured
    /// timeout.
    ///
    /// A timed-out call keeps running on the backend's worker and may still
    /// land after the locks are released; the worker logs when it does.
    fn call_bounded<T, F>(&self, index: usize, op: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RootBackend) -> BackendResult<T> + Send + 'static,
    {
        match self.timeout {
            Some(timeout) => self.workers[index].call(timeout, op),
            None => op(self.backends[index].as_ref()),
        }
    }
}

/// Index of the authoritative observation, or `None` if no backend holds one.
fn select_authoritative(policy: ReconcilePolicy, observations: &[Observation]) -> Option<usize> {
    let holders = observations
        .iter()
        .enumerate()
        .filter_map(|(index, o)| o.record().map(|record| (index, record)));

    match policy {
        ReconcilePolicy::HighestPriority => holders.map(|(index, _)| index).next(),
        ReconcilePolicy::Majority => {
            let holders: Vec<_> = holders.collect();
            let mut best: Option<(usize, usize)> = None;
            for &(index, record) in &holders {
                let votes = holders
                    .iter()
                    .filter(|(_, other)| other.root() == record.root())
                    .count();
                // Strictly greater keeps the earliest (highest-priority) index on ties.
                if best.is_none_or(|(_, best_votes)| votes > best_votes) {
                    best = Some((index, votes));
                }
            }
            best.map(|(index, _)| index)
        }
    }
}

fn join_ids(ids: &[BackendId]) -> String {
    if ids.is_empty() {
        return "none".to_string();
    }
    ids.iter()
        .map(BackendId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_failures<'a>(
    failures: impl Iterator<Item = (&'a BackendId, &'a BackendError)>,
) -> String {
    let reasons: Vec<String> = failures.map(|(id, err)| format!("{id}: {err}")).collect();
    if reasons.is_empty() {
        "no backends configured".to_string()
    } else {
        reasons.join("; ")
    }
}
