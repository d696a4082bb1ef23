//! Download worker service
//!
//! Each worker owns one bounded receiver and processes envelopes serially:
//! constraint gate, transfer, terminal bookkeeping. The scheduler
//! guarantees a given record is handed to exactly one worker.

pub mod http;
pub mod job;

use crate::scheduler::SchedulerCore;
use crate::scheduler::admission::JobEnvelope;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub(crate) async fn run_worker(
    worker_id: usize,
    mut rx: mpsc::Receiver<JobEnvelope>,
    core: Arc<SchedulerCore>,
) {
    info!(worker_id, "Worker started");
    while let Some(envelope) = rx.recv().await {
        process(worker_id, envelope, &core).await;
    }
    debug!(worker_id, "Worker channel closed, exiting");
}

async fn process(worker_id: usize, envelope: JobEnvelope, core: &Arc<SchedulerCore>) {
    let record = envelope.record.clone();
    debug!(worker_id, job_id = %record.id, key = %record.key, "Picked up job");

    // Constraint gate: the policy is fixed, the environment is re-probed
    // on every poll. Budget exhaustion is a terminal failure, never an
    // indefinite Queued state.
    let mut polls = 0u32;
    loop {
        if envelope.cancel.load(Ordering::Relaxed) {
            debug!(worker_id, job_id = %record.id, "Job cancelled before start");
            let failed = record.failed(crate::scheduler::REASON_SUPERSEDED);
            core.finish(&envelope, failed).await;
            return;
        }

        let env = core.probe.snapshot();
        if record.constraints.is_satisfied(&env) {
            break;
        }

        polls += 1;
        if polls >= core.gate.poll_budget {
            warn!(worker_id, job_id = %record.id, polls, "Constraint budget exhausted");
            let failed = record.failed(format!("constraints not satisfied after {} polls", polls));
            core.finish(&envelope, failed).await;
            return;
        }

        debug!(worker_id, job_id = %record.id, polls, "Constraints unsatisfied, waiting");
        tokio::time::sleep(core.gate.poll_interval).await;
    }

    // The transfer starts only after the Running snapshot lands; a feed
    // already driven terminal (Replace) rejects it and the job stops here.
    let running = record.running();
    if !core.publish(&envelope.feed, running.clone()).await {
        debug!(worker_id, job_id = %record.id, "Feed already terminal, skipping transfer");
        core.finish(&envelope, record.failed(crate::scheduler::REASON_SUPERSEDED))
            .await;
        return;
    }

    let terminal = match job::execute(&running, &core.http, &core.storage).await {
        Ok(location) => record.succeeded(location),
        Err(e) => record.failed(e.to_string()),
    };
    core.finish(&envelope, terminal).await;
}
