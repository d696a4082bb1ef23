//! Job records, states and handles

use crate::constraints::ConstraintPolicy;
use crate::descriptor::DownloadDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a job. Ordered: `Queued < Running < terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Position in the state order; used to reject regressions.
    pub fn rank(&self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Running => 1,
            JobState::Succeeded | JobState::Failed => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

/// One submission's full state, as stored in the journal and delivered to
/// observers. Snapshots are cloned out; the canonical copy lives in the
/// job's state feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub key: String,
    pub descriptor: DownloadDescriptor,
    /// Declared at submission, immutable thereafter; re-evaluated by the
    /// scheduler on every gate attempt.
    #[serde(default)]
    pub constraints: ConstraintPolicy,
    pub state: JobState,
    /// Set only when `state == Succeeded`.
    pub artifact_location: Option<String>,
    /// Set only when `state == Failed`.
    pub failure_reason: Option<String>,
    pub attempt: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh Queued record with a time-sortable UUIDv7 id.
    pub fn new(
        key: impl Into<String>,
        descriptor: DownloadDescriptor,
        constraints: ConstraintPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            key: key.into(),
            descriptor,
            constraints,
            state: JobState::Queued,
            artifact_location: None,
            failure_reason: None,
            attempt: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn running(&self) -> Self {
        let mut next = self.clone();
        next.state = JobState::Running;
        next.updated_at = Utc::now();
        next
    }

    pub fn succeeded(&self, artifact_location: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.state = JobState::Succeeded;
        next.artifact_location = Some(artifact_location.into());
        next.updated_at = Utc::now();
        next
    }

    pub fn failed(&self, reason: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.state = JobState::Failed;
        next.failure_reason = Some(reason.into());
        next.updated_at = Utc::now();
        next
    }

    /// Queued copy for re-dispatch after journal recovery.
    pub fn requeued(&self) -> Self {
        let mut next = self.clone();
        next.state = JobState::Queued;
        next.attempt = self.attempt + 1;
        next.artifact_location = None;
        next.failure_reason = None;
        next.updated_at = Utc::now();
        next
    }
}

/// Reference to a submitted job, used to query state and attach observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        let descriptor =
            DownloadDescriptor::new("report", "http://host/report.pdf", "application/pdf").unwrap();
        JobRecord::new("slot", descriptor, ConstraintPolicy::default())
    }

    #[test]
    fn test_state_order() {
        assert!(JobState::Queued.rank() < JobState::Running.rank());
        assert!(JobState::Running.rank() < JobState::Succeeded.rank());
        assert_eq!(JobState::Succeeded.rank(), JobState::Failed.rank());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Queued.is_terminal());
    }

    #[test]
    fn test_terminal_fields() {
        let record = record();
        assert_eq!(record.state, JobState::Queued);
        assert_eq!(record.attempt, 1);

        let done = record.succeeded("mem://bucket/artifacts/x/report.pdf");
        assert_eq!(done.state, JobState::Succeeded);
        assert!(done.artifact_location.is_some());
        assert!(done.failure_reason.is_none());

        let failed = record.failed("connection refused");
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("connection refused"));
        assert!(failed.artifact_location.is_none());
    }

    #[test]
    fn test_requeue_increments_attempt() {
        let record = record();
        let requeued = record.running().requeued();
        assert_eq!(requeued.state, JobState::Queued);
        assert_eq!(requeued.attempt, 2);
        assert_eq!(requeued.id, record.id);
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = record();
        let json = serde_json::to_vec(&record).unwrap();
        let back: JobRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.state, JobState::Queued);
        assert_eq!(back.descriptor, record.descriptor);
    }
}
