//! Keyed admission: at most one live job per key
//!
//! The table maps each job key to a slot. A slot holds the live entry (a
//! record in Queued or Running) plus any submissions appended behind it.
//! Racing submitters serialize on the slot's own mutex, so the
//! check-then-create sequence is atomic per key without a global lock
//! across keys.

use super::observer::StateFeed;
use super::record::JobRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// What to do when a submission finds a live job under its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Return a handle to the live job; do not start a new one.
    #[default]
    Keep,
    /// Cancel the live job and start fresh.
    Replace,
    /// Run after the live job reaches a terminal state.
    Append,
}

/// Dispatch unit: one submission, ready for a worker. The constraint
/// policy travels inside the record.
pub struct JobEnvelope {
    pub record: JobRecord,
    pub feed: Arc<StateFeed>,
    pub cancel: Arc<AtomicBool>,
}

/// Live entry occupying a key slot.
pub struct LiveJob {
    pub record_id: String,
    pub feed: Arc<StateFeed>,
    pub cancel: Arc<AtomicBool>,
}

#[derive(Default)]
struct KeySlot {
    live: Option<LiveJob>,
    pending: VecDeque<JobEnvelope>,
}

#[derive(Default)]
pub struct AdmissionTable {
    slots: RwLock<HashMap<String, Arc<Mutex<KeySlot>>>>,
}

impl AdmissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the slot for `key`, creating it on first use. The returned
    /// guard holds the slot's mutex until dropped.
    pub async fn lock_slot(&self, key: &str) -> SlotGuard {
        let slot = {
            let slots = self.slots.read().await;
            slots.get(key).cloned()
        };
        let slot = match slot {
            Some(slot) => slot,
            None => {
                let mut slots = self.slots.write().await;
                slots.entry(key.to_string()).or_default().clone()
            }
        };
        SlotGuard {
            guard: slot.lock_owned().await,
        }
    }
}

pub struct SlotGuard {
    guard: OwnedMutexGuard<KeySlot>,
}

impl SlotGuard {
    pub fn live(&self) -> Option<&LiveJob> {
        self.guard.live.as_ref()
    }

    /// Install a new live entry, returning any entry it displaced.
    pub fn install_live(&mut self, live: LiveJob) -> Option<LiveJob> {
        self.guard.live.replace(live)
    }

    pub fn push_pending(&mut self, envelope: JobEnvelope) {
        self.guard.pending.push_back(envelope);
    }

    pub fn pending_len(&self) -> usize {
        self.guard.pending.len()
    }

    /// Release the slot if `record_id` still owns it. Any appended
    /// successor is installed as the new live entry before the lock is
    /// given up, so the key is never observably free while work is queued
    /// behind it. Returns the successor for dispatch.
    pub fn release(&mut self, record_id: &str) -> Option<JobEnvelope> {
        let owns = matches!(&self.guard.live, Some(live) if live.record_id == record_id);
        if !owns {
            // a Replace submission already took the slot over
            return None;
        }
        self.guard.live = None;

        let next = self.guard.pending.pop_front()?;
        self.guard.live = Some(LiveJob {
            record_id: next.record.id.clone(),
            feed: next.feed.clone(),
            cancel: next.cancel.clone(),
        });
        Some(next)
    }
}
