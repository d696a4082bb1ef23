//! Fjall-backed job journal
//!
//! Partition layout:
//! - `jobs`: job:{id} -> JobRecord (JSON)
//! - `live`: live:{key} -> record id
//!
//! The `live` index tracks which record currently occupies each key. It is
//! written on every non-terminal upsert and cleared when the owning record
//! reaches a terminal state, so [`Journal::recover`] after a process death
//! yields exactly the submissions that were still in flight.

use super::record::JobRecord;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JournalError>;

fn encode_job_key(id: &str) -> Vec<u8> {
    format!("job:{}", id).into_bytes()
}

fn encode_live_key(key: &str) -> Vec<u8> {
    format!("live:{}", key).into_bytes()
}

pub struct Journal {
    keyspace: Keyspace,
    jobs: PartitionHandle,
    live: PartitionHandle,
}

impl Journal {
    /// Open or create a journal at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening job journal at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let live = keyspace.open_partition("live", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            jobs,
            live,
        })
    }

    /// Store a record snapshot and maintain the live-key index.
    pub fn upsert(&self, record: &JobRecord) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        self.jobs.insert(encode_job_key(&record.id), value)?;

        let live_key = encode_live_key(&record.key);
        if record.state.is_terminal() {
            // only the owner clears the index; a Replace may have already
            // pointed the key at a newer record
            if let Some(owner) = self.live.get(&live_key)? {
                if owner.as_ref() == record.id.as_bytes() {
                    self.live.remove(live_key)?;
                }
            }
        } else {
            self.live.insert(live_key, record.id.as_bytes())?;
        }

        debug!(job_id = %record.id, state = record.state.label(), "Journaled job snapshot");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        match self.jobs.get(encode_job_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Records that were live (Queued or Running) at last shutdown. Stale
    /// index entries pointing at missing or terminal records are dropped.
    pub fn recover(&self) -> Result<Vec<JobRecord>> {
        let mut recovered = Vec::new();
        let mut stale = Vec::new();

        for item in self.live.iter() {
            let (key, id) = item?;
            let id = String::from_utf8_lossy(&id).to_string();
            match self.get(&id)? {
                Some(record) if !record.state.is_terminal() => recovered.push(record),
                _ => {
                    warn!(job_id = %id, "Dropping stale live-index entry");
                    stale.push(key);
                }
            }
        }

        for key in stale {
            self.live.remove(key)?;
        }

        if !recovered.is_empty() {
            info!(count = recovered.len(), "Recovered interrupted jobs from journal");
        }
        Ok(recovered)
    }

    /// Flush all pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintPolicy;
    use crate::descriptor::DownloadDescriptor;
    use tempfile::TempDir;

    fn record(key: &str) -> JobRecord {
        let descriptor =
            DownloadDescriptor::new("report", "http://host/report.pdf", "application/pdf").unwrap();
        JobRecord::new(key, descriptor, ConstraintPolicy::default())
    }

    fn open_test_journal() -> (Journal, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let journal = Journal::open(temp_dir.path().join("journal")).unwrap();
        (journal, temp_dir)
    }

    #[test]
    fn test_upsert_and_get() {
        let (journal, _temp) = open_test_journal();
        let record = record("slot");

        journal.upsert(&record).unwrap();
        let retrieved = journal.get(&record.id).unwrap().unwrap();
        assert_eq!(retrieved.id, record.id);
        assert_eq!(retrieved.key, "slot");
    }

    #[test]
    fn test_get_missing_record() {
        let (journal, _temp) = open_test_journal();
        assert!(journal.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_terminal_upsert_clears_live_index() {
        let (journal, _temp) = open_test_journal();
        let record = record("slot");

        journal.upsert(&record).unwrap();
        assert_eq!(journal.recover().unwrap().len(), 1);

        journal.upsert(&record.succeeded("mem://b/a/report.pdf")).unwrap();
        assert!(journal.recover().unwrap().is_empty());
    }

    #[test]
    fn test_recovery_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("journal");
        let queued = record("slot");

        {
            let journal = Journal::open(&path).unwrap();
            journal.upsert(&queued).unwrap();
            journal.upsert(&queued.running()).unwrap();
            journal.persist().unwrap();
        }

        let journal = Journal::open(&path).unwrap();
        let recovered = journal.recover().unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, queued.id);
    }

    #[test]
    fn test_terminal_upsert_by_stale_owner_keeps_index() {
        let (journal, _temp) = open_test_journal();
        let old = record("slot");
        let replacement = record("slot");

        journal.upsert(&old).unwrap();
        journal.upsert(&replacement).unwrap();
        // the old record failing must not evict the replacement's claim
        journal.upsert(&old.failed("superseded")).unwrap();

        let recovered = journal.recover().unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, replacement.id);
    }
}
