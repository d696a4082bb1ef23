//! Per-job state feed and observer streams
//!
//! Every job owns one [`StateFeed`]. Workers publish snapshots into it;
//! observers pull a [`StateStream`] off it. Delivery rules:
//!
//! - a new stream starts with the current snapshot, then receives every
//!   later transition (nothing is skipped for a registered observer)
//! - snapshot order is non-decreasing in [`JobState`] rank; the feed
//!   rejects regressions and anything published after a terminal snapshot
//! - the stream ends right after delivering a terminal snapshot
//! - subscribing after termination yields exactly the final snapshot

use super::record::JobRecord;
use std::sync::Mutex;
use tokio::sync::mpsc;

pub struct StateFeed {
    inner: Mutex<FeedInner>,
}

struct FeedInner {
    latest: JobRecord,
    subscribers: Vec<mpsc::UnboundedSender<JobRecord>>,
}

impl StateFeed {
    pub fn new(initial: JobRecord) -> Self {
        Self {
            inner: Mutex::new(FeedInner {
                latest: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Current snapshot.
    pub fn latest(&self) -> JobRecord {
        self.inner.lock().expect("feed lock poisoned").latest.clone()
    }

    /// Publish a snapshot to all subscribers. Returns false (and delivers
    /// nothing) if the feed is already terminal or the snapshot would move
    /// the state backwards - a re-invoked worker cannot resurface stale
    /// state through a terminal feed.
    pub fn publish(&self, next: JobRecord) -> bool {
        let mut inner = self.inner.lock().expect("feed lock poisoned");
        if inner.latest.state.is_terminal() {
            return false;
        }
        if next.state.rank() < inner.latest.state.rank() {
            return false;
        }

        let terminal = next.state.is_terminal();
        inner.latest = next.clone();
        inner.subscribers.retain(|tx| tx.send(next.clone()).is_ok());
        if terminal {
            // dropping the senders ends every stream after this snapshot
            inner.subscribers.clear();
        }
        true
    }

    pub fn subscribe(&self) -> StateStream {
        let mut inner = self.inner.lock().expect("feed lock poisoned");
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(inner.latest.clone());
        if !inner.latest.state.is_terminal() {
            inner.subscribers.push(tx);
        }
        StateStream { rx }
    }
}

/// Finite sequence of job snapshots, ending after a terminal one.
pub struct StateStream {
    rx: mpsc::UnboundedReceiver<JobRecord>,
}

impl StateStream {
    /// Next snapshot, or None once the job reached a terminal state and the
    /// terminal snapshot has been consumed.
    pub async fn next(&mut self) -> Option<JobRecord> {
        self.rx.recv().await
    }

    /// Drain the stream and return the terminal snapshot.
    pub async fn wait_terminal(mut self) -> Option<JobRecord> {
        let mut last = None;
        while let Some(record) = self.next().await {
            last = Some(record);
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintPolicy;
    use crate::descriptor::DownloadDescriptor;
    use crate::scheduler::record::JobState;

    fn record() -> JobRecord {
        let descriptor =
            DownloadDescriptor::new("report", "http://host/report.pdf", "application/pdf").unwrap();
        JobRecord::new("slot", descriptor, ConstraintPolicy::default())
    }

    #[tokio::test]
    async fn test_subscriber_sees_every_transition() {
        let queued = record();
        let feed = StateFeed::new(queued.clone());
        let mut stream = feed.subscribe();

        let running = queued.running();
        let done = queued.succeeded("mem://b/a/report.pdf");
        assert!(feed.publish(running.clone()));
        assert!(feed.publish(done.clone()));

        assert_eq!(stream.next().await.unwrap().state, JobState::Queued);
        assert_eq!(stream.next().await.unwrap().state, JobState::Running);
        assert_eq!(stream.next().await.unwrap().state, JobState::Succeeded);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_rejects_regression_and_post_terminal_publish() {
        let queued = record();
        let feed = StateFeed::new(queued.clone());

        let running = queued.running();
        assert!(feed.publish(running.clone()));
        // Running -> Queued would be a regression
        assert!(!feed.publish(queued.clone()));

        let failed = queued.failed("boom");
        assert!(feed.publish(failed));
        // terminal is final; a late success report is dropped
        assert!(!feed.publish(queued.succeeded("mem://b/x")));
        assert_eq!(feed.latest().state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_subscribe_after_terminal_yields_single_snapshot() {
        let queued = record();
        let feed = StateFeed::new(queued.clone());
        feed.publish(queued.running());
        feed.publish(queued.succeeded("mem://b/a/report.pdf"));

        let mut stream = feed.subscribe();
        let only = stream.next().await.unwrap();
        assert_eq!(only.state, JobState::Succeeded);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_terminal() {
        let queued = record();
        let feed = StateFeed::new(queued.clone());
        let stream = feed.subscribe();

        feed.publish(queued.running());
        feed.publish(queued.failed("offline"));

        let terminal = stream.wait_terminal().await.unwrap();
        assert_eq!(terminal.state, JobState::Failed);
        assert_eq!(terminal.failure_reason.as_deref(), Some("offline"));
    }
}
