//! Status sink - one-way push of job state for UI-style feedback
//!
//! The scheduler notifies the sink on every accepted state transition.
//! Sink failures are the sink's problem; they are never propagated back
//! into job state.

use crate::scheduler::record::{JobRecord, JobState};
use async_trait::async_trait;

#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn notify(&self, record: &JobRecord);
}

/// Default sink: logs state labels the way the original screen toasted
/// them, and on success logs the artifact location for the caller to open.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StatusSink for LogSink {
    async fn notify(&self, record: &JobRecord) {
        match record.state {
            JobState::Queued => {
                tracing::info!(job_id = %record.id, key = %record.key, "Download queued");
            }
            JobState::Running => {
                tracing::info!(job_id = %record.id, key = %record.key, "File downloading");
            }
            JobState::Failed => {
                tracing::warn!(
                    job_id = %record.id,
                    key = %record.key,
                    reason = record.failure_reason.as_deref().unwrap_or("unknown"),
                    "Download failed"
                );
            }
            JobState::Succeeded => {
                tracing::info!(
                    job_id = %record.id,
                    key = %record.key,
                    location = record.artifact_location.as_deref().unwrap_or(""),
                    "Download succeeded"
                );
            }
        }
    }
}

/// Records every notification; lets tests assert on sink traffic.
#[derive(Default)]
pub struct CapturingSink {
    seen: std::sync::Mutex<Vec<(String, JobState)>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<(String, JobState)> {
        self.seen.lock().expect("sink lock poisoned").clone()
    }
}

#[async_trait]
impl StatusSink for CapturingSink {
    async fn notify(&self, record: &JobRecord) {
        self.seen
            .lock()
            .expect("sink lock poisoned")
            .push((record.id.clone(), record.state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintPolicy;
    use crate::descriptor::DownloadDescriptor;

    #[tokio::test]
    async fn test_capturing_sink_sees_transitions() {
        let descriptor =
            DownloadDescriptor::new("report", "http://host/report.pdf", "application/pdf").unwrap();
        let record = JobRecord::new("slot", descriptor, ConstraintPolicy::default());

        let sink = CapturingSink::default();
        sink.notify(&record).await;
        sink.notify(&record.running()).await;

        let seen = sink.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, JobState::Queued);
        assert_eq!(seen[1].1, JobState::Running);
    }
}
