//! Job scheduler: admission, dispatch, state, observation
//!
//! The scheduler is the concrete primitive behind the
//! `submit / get_state / subscribe` contract. Submissions are admitted
//! against the per-key table, journaled, then distributed round-robin to a
//! fixed pool of workers over bounded channels. Workers gate on the job's
//! constraint policy, run the transfer and publish state transitions back
//! through the job's feed.
//!
//! A scheduler is an explicitly constructed value - build one with
//! [`Scheduler::builder`], tear it down with [`Scheduler::shutdown`].
//! Shutdown is immediate: in-flight work is interrupted and recovered from
//! the journal at the next open, the same way the process dying would be
//! handled.

pub mod admission;
pub mod journal;
pub mod observer;
pub mod record;

use crate::constraints::{ConstraintPolicy, EnvironmentProbe, FixedEnvironment};
use crate::descriptor::{DescriptorError, DownloadDescriptor};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::sink::{LogSink, StatusSink};
use crate::storage::StorageClient;
use crate::worker;
use crate::worker::http::{DownloadError, HttpClient, HttpConfig};
use admission::{AdmissionTable, JobEnvelope, LiveJob};
use journal::Journal;
use observer::StateFeed;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Re-export the submission-facing types
pub use admission::ConflictPolicy;
pub use journal::JournalError;
pub use observer::StateStream;
pub use record::{JobHandle, JobRecord, JobState};

/// Failure reason reported when a Replace submission displaces a live job.
pub const REASON_SUPERSEDED: &str = "superseded by a replacing submission";

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is shut down")]
    Closed,

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("HTTP client error: {0}")]
    Http(#[from] DownloadError),
}

/// Constraint gate settings: how often a queued job re-checks its policy
/// and how many checks it gets before failing with a constraint timeout.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub poll_interval: Duration,
    pub poll_budget: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            poll_budget: 20,
        }
    }
}

/// Shared state behind the public [`Scheduler`] facade. Workers hold an
/// Arc to this.
pub(crate) struct SchedulerCore {
    pub(crate) admission: AdmissionTable,
    pub(crate) feeds: RwLock<HashMap<String, Arc<StateFeed>>>,
    pub(crate) journal: Option<Journal>,
    pub(crate) storage: StorageClient,
    pub(crate) probe: Arc<dyn EnvironmentProbe>,
    pub(crate) sink: Arc<dyn StatusSink>,
    pub(crate) metrics: Metrics,
    pub(crate) gate: GateConfig,
    pub(crate) http: HttpClient,
    /// Senders into the worker pool; taken on shutdown so late submissions
    /// see [`SchedulerError::Closed`].
    dispatchers: RwLock<Option<Vec<mpsc::Sender<JobEnvelope>>>>,
    next_worker: AtomicUsize,
}

impl SchedulerCore {
    /// Publish a snapshot to the job's feed, the journal and the sink.
    /// Returns false when the feed rejected it (terminal or regressive);
    /// rejected snapshots reach neither the journal nor the sink.
    pub(crate) async fn publish(&self, feed: &StateFeed, record: JobRecord) -> bool {
        if !feed.publish(record.clone()) {
            return false;
        }

        if let Some(journal) = &self.journal {
            // a journal hiccup must not break state reporting
            if let Err(e) = journal.upsert(&record) {
                warn!(job_id = %record.id, error = %e, "Failed to journal job snapshot");
            }
        }

        self.sink.notify(&record).await;
        true
    }

    /// Hand an envelope to the worker pool. The send runs on a detached
    /// task so a worker promoting an appended successor never blocks on
    /// its own full queue. A send can only fail against a shutting-down
    /// pool; the record stays Queued in the journal and is re-dispatched
    /// at the next open.
    pub(crate) fn dispatch(&self, envelope: JobEnvelope) {
        let sender = {
            let guard = self.dispatchers.read().expect("dispatcher lock poisoned");
            guard.as_ref().and_then(|senders| {
                if senders.is_empty() {
                    return None;
                }
                let idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % senders.len();
                Some(senders[idx].clone())
            })
        };

        let job_id = envelope.record.id.clone();
        tokio::spawn(async move {
            let delivered = match sender {
                Some(tx) => tx.send(envelope).await.is_ok(),
                None => false,
            };
            if !delivered {
                warn!(%job_id, "Worker pool stopped before dispatch; job remains journaled");
            }
        });
    }

    /// Terminal bookkeeping: publish the terminal snapshot, bump counters,
    /// free the key slot and dispatch any appended successor.
    pub(crate) async fn finish(&self, envelope: &JobEnvelope, terminal: JobRecord) {
        let published = self.publish(&envelope.feed, terminal.clone()).await;
        if published {
            match terminal.state {
                JobState::Succeeded => self.metrics.job_succeeded(),
                JobState::Failed => self.metrics.job_failed(),
                _ => {}
            }
        }

        let next = {
            let mut slot = self.admission.lock_slot(&envelope.record.key).await;
            slot.release(&envelope.record.id)
        };
        if let Some(successor) = next {
            debug!(
                key = %envelope.record.key,
                job_id = %successor.record.id,
                "Promoting appended job"
            );
            self.dispatch(successor);
        }
    }
}

pub struct SchedulerBuilder {
    storage: Option<StorageClient>,
    probe: Arc<dyn EnvironmentProbe>,
    sink: Arc<dyn StatusSink>,
    gate: GateConfig,
    http: HttpConfig,
    journal_path: Option<PathBuf>,
    workers: usize,
    channel_size: usize,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self {
            storage: None,
            probe: Arc::new(FixedEnvironment::nominal()),
            sink: Arc::new(LogSink::new()),
            gate: GateConfig::default(),
            http: HttpConfig::default(),
            journal_path: None,
            workers: 2,
            channel_size: 100,
        }
    }
}

impl SchedulerBuilder {
    pub fn storage(mut self, storage: StorageClient) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn EnvironmentProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Enable the fjall journal at `path`. Without a journal the scheduler
    /// is purely in-memory and nothing survives a restart.
    pub fn journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    /// Open the journal, spawn the worker pool and re-dispatch any jobs
    /// that were live when the previous process stopped.
    pub async fn build(self) -> Result<Scheduler, SchedulerError> {
        let journal = self.journal_path.map(Journal::open).transpose()?;
        let http = HttpClient::new(self.http)?;
        let storage = self.storage.unwrap_or_else(StorageClient::in_memory);

        info!(
            workers = self.workers,
            channel_size = self.channel_size,
            journaled = journal.is_some(),
            "Starting scheduler"
        );

        let mut senders = Vec::with_capacity(self.workers);
        let mut receivers = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let (tx, rx) = mpsc::channel(self.channel_size);
            senders.push(tx);
            receivers.push(rx);
        }

        let core = Arc::new(SchedulerCore {
            admission: AdmissionTable::new(),
            feeds: RwLock::new(HashMap::new()),
            journal,
            storage,
            probe: self.probe,
            sink: self.sink,
            metrics: Metrics::new(),
            gate: self.gate,
            http,
            dispatchers: RwLock::new(Some(senders)),
            next_worker: AtomicUsize::new(0),
        });

        let workers = receivers
            .into_iter()
            .enumerate()
            .map(|(worker_id, rx)| tokio::spawn(worker::run_worker(worker_id, rx, core.clone())))
            .collect();

        let scheduler = Scheduler {
            core,
            workers: std::sync::Mutex::new(workers),
        };
        scheduler.recover().await?;
        Ok(scheduler)
    }
}

pub struct Scheduler {
    core: Arc<SchedulerCore>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    /// Submit a download under `key`. Exactly one record per key is live at
    /// any instant; what happens when the key is occupied is decided by
    /// `on_conflict` (the reference behavior is [`ConflictPolicy::Keep`]).
    pub async fn submit(
        &self,
        key: &str,
        descriptor: DownloadDescriptor,
        constraints: ConstraintPolicy,
        on_conflict: ConflictPolicy,
    ) -> Result<JobHandle, SchedulerError> {
        descriptor.validate()?;
        self.ensure_open()?;

        let mut slot = self.core.admission.lock_slot(key).await;

        let existing = slot
            .live()
            .map(|live| (live.record_id.clone(), live.feed.clone(), live.cancel.clone()));

        if let Some((live_id, live_feed, live_cancel)) = existing {
            match on_conflict {
                ConflictPolicy::Keep => {
                    debug!(key, job_id = %live_id, "Keeping existing live job");
                    self.core.metrics.job_deduplicated();
                    return Ok(JobHandle {
                        id: live_id,
                        key: key.to_string(),
                    });
                }
                ConflictPolicy::Replace => {
                    info!(key, job_id = %live_id, "Replacing live job");
                    live_cancel.store(true, Ordering::Relaxed);
                    let superseded = live_feed.latest().failed(REASON_SUPERSEDED);
                    if self.core.publish(&live_feed, superseded).await {
                        self.core.metrics.job_failed();
                    }

                    let (envelope, handle, live) = self.new_submission(key, descriptor, constraints)?;
                    slot.install_live(live);
                    drop(slot);
                    self.core.dispatch(envelope);
                    return Ok(handle);
                }
                ConflictPolicy::Append => {
                    let (envelope, handle, _live) = self.new_submission(key, descriptor, constraints)?;
                    info!(key, job_id = %handle.id, behind = %live_id, "Appending job behind live one");
                    slot.push_pending(envelope);
                    return Ok(handle);
                }
            }
        }

        let (envelope, handle, live) = self.new_submission(key, descriptor, constraints)?;
        info!(key, job_id = %handle.id, "Job admitted");
        slot.install_live(live);
        drop(slot);
        self.core.dispatch(envelope);
        Ok(handle)
    }

    /// Current snapshot for a job. Falls back to the journal for records
    /// from previous runs.
    pub async fn get_state(&self, handle: &JobHandle) -> Result<JobRecord, SchedulerError> {
        if let Some(feed) = self.feed_for(&handle.id) {
            return Ok(feed.latest());
        }
        if let Some(journal) = &self.core.journal {
            if let Some(record) = journal.get(&handle.id)? {
                return Ok(record);
            }
        }
        Err(SchedulerError::UnknownJob(handle.id.clone()))
    }

    /// Observer stream for a job; see [`observer::StateStream`] for the
    /// delivery guarantees.
    pub async fn subscribe(&self, handle: &JobHandle) -> Result<StateStream, SchedulerError> {
        if let Some(feed) = self.feed_for(&handle.id) {
            return Ok(feed.subscribe());
        }
        // terminal record from a previous run: a one-shot stream
        if let Some(journal) = &self.core.journal {
            if let Some(record) = journal.get(&handle.id)? {
                return Ok(StateFeed::new(record).subscribe());
            }
        }
        Err(SchedulerError::UnknownJob(handle.id.clone()))
    }

    /// Handle to whatever job currently occupies `key`, if any.
    pub async fn handle_for_key(&self, key: &str) -> Option<JobHandle> {
        let slot = self.core.admission.lock_slot(key).await;
        slot.live().map(|live| JobHandle {
            id: live.record_id.clone(),
            key: key.to_string(),
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Stop the worker pool. Queued and running jobs are interrupted; with
    /// a journal they are re-dispatched at the next open. Further submit
    /// calls return [`SchedulerError::Closed`]. Idempotent.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        info!("Shutting down scheduler");
        {
            let mut dispatchers = self
                .core
                .dispatchers
                .write()
                .expect("dispatcher lock poisoned");
            dispatchers.take();
        }
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().expect("worker lock poisoned");
            workers.drain(..).collect()
        };
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        if let Some(journal) = &self.core.journal {
            journal.persist()?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SchedulerError> {
        let dispatchers = self
            .core
            .dispatchers
            .read()
            .expect("dispatcher lock poisoned");
        if dispatchers.is_none() {
            return Err(SchedulerError::Closed);
        }
        Ok(())
    }

    fn feed_for(&self, id: &str) -> Option<Arc<StateFeed>> {
        self.core
            .feeds
            .read()
            .expect("feeds lock poisoned")
            .get(id)
            .cloned()
    }

    /// Create the record, feed and journal entry for a fresh submission.
    fn new_submission(
        &self,
        key: &str,
        descriptor: DownloadDescriptor,
        constraints: ConstraintPolicy,
    ) -> Result<(JobEnvelope, JobHandle, LiveJob), SchedulerError> {
        let record = JobRecord::new(key, descriptor, constraints);
        let feed = Arc::new(StateFeed::new(record.clone()));
        let cancel = Arc::new(AtomicBool::new(false));

        if let Some(journal) = &self.core.journal {
            journal.upsert(&record)?;
        }
        self.core
            .feeds
            .write()
            .expect("feeds lock poisoned")
            .insert(record.id.clone(), feed.clone());
        self.core.metrics.job_submitted();

        let live = LiveJob {
            record_id: record.id.clone(),
            feed: feed.clone(),
            cancel: cancel.clone(),
        };
        let handle = JobHandle {
            id: record.id.clone(),
            key: key.to_string(),
        };
        let envelope = JobEnvelope {
            record,
            feed,
            cancel,
        };
        Ok((envelope, handle, live))
    }

    /// Re-dispatch jobs the journal reports as interrupted.
    async fn recover(&self) -> Result<(), SchedulerError> {
        let Some(journal) = &self.core.journal else {
            return Ok(());
        };

        for old in journal.recover()? {
            let record = old.requeued();
            journal.upsert(&record)?;

            let feed = Arc::new(StateFeed::new(record.clone()));
            let cancel = Arc::new(AtomicBool::new(false));
            self.core
                .feeds
                .write()
                .expect("feeds lock poisoned")
                .insert(record.id.clone(), feed.clone());

            let mut slot = self.core.admission.lock_slot(&record.key).await;
            if slot.live().is_some() {
                // the live index holds at most one entry per key
                warn!(key = %record.key, job_id = %record.id, "Key already occupied during recovery");
                continue;
            }
            slot.install_live(LiveJob {
                record_id: record.id.clone(),
                feed: feed.clone(),
                cancel: cancel.clone(),
            });
            drop(slot);

            info!(key = %record.key, job_id = %record.id, attempt = record.attempt, "Re-dispatching recovered job");
            self.core.metrics.job_recovered();
            self.core.dispatch(JobEnvelope {
                record,
                feed,
                cancel,
            });
        }
        Ok(())
    }
}
