//! Stateless dispatch tick over the scheduled job queue.
//!
//! Each tick claims a batch of due jobs with the skip-locked claim (so
//! concurrent dispatchers never double-run a job), fans them out
//! concurrently, and resolves every claimed job as completed or failed. A
//! job is never left in `processing` by a normally-returning tick.

use std::time::{Duration, Instant};

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::kernel::jobs::{scheduler, ScheduledJob};
use crate::kernel::ServerKernel;

use super::handlers::{self, HandlerOutcome};

/// Jobs claimed per tick. Bounds the SMS/LLM fan-out of one tick.
pub const BATCH_SIZE: i64 = 25;

/// A tick running longer than this signals saturation: prompts are firing
/// late, though nothing is lost.
const SLOW_TICK_WARN: Duration = Duration::from_secs(10);

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Run one dispatch tick: claim due jobs, execute them, resolve outcomes.
pub async fn run_tick(kernel: &ServerKernel) -> Result<DispatchSummary> {
    let started = Instant::now();

    let jobs = ScheduledJob::claim_due(BATCH_SIZE, &kernel.db_pool).await?;
    let claimed = jobs.len();

    if claimed == 0 {
        return Ok(DispatchSummary {
            elapsed_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        });
    }

    let results = join_all(jobs.iter().map(|job| run_one(kernel, job))).await;

    let mut succeeded = 0;
    let mut failed = 0;
    for ok in results {
        if ok {
            succeeded += 1;
        } else {
            failed += 1;
        }
    }

    let summary = DispatchSummary {
        claimed,
        succeeded,
        failed,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    if started.elapsed() > SLOW_TICK_WARN {
        warn!(
            claimed = summary.claimed,
            elapsed_ms = summary.elapsed_ms,
            "dispatch tick exceeded target ceiling"
        );
    }

    info!(
        claimed = summary.claimed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_ms = summary.elapsed_ms,
        "dispatch tick"
    );

    Ok(summary)
}

/// Execute one claimed job and resolve its queue row. Never propagates the
/// handler's error; a failure is recorded on the job and counted.
async fn run_one(kernel: &ServerKernel, job: &ScheduledJob) -> bool {
    match handlers::execute(kernel, job).await {
        Ok(outcome) => {
            if let HandlerOutcome::Skipped(reason) = outcome {
                info!(job_id = %job.id, job_type = ?job.job_type, reason = %reason, "job skipped");
            }
            if let Err(e) = scheduler::mark_completed(job, &kernel.db_pool).await {
                error!(job_id = %job.id, error = %e, "failed to mark job completed");
                return false;
            }
            true
        }
        Err(e) => {
            warn!(
                job_id = %job.id,
                job_type = ?job.job_type,
                attempts = job.attempts,
                error = %e,
                "job handler failed"
            );
            if let Err(resolve_err) =
                scheduler::mark_failed(job, &e.to_string(), &kernel.db_pool).await
            {
                error!(job_id = %job.id, error = %resolve_err, "failed to record job failure");
            }
            false
        }
    }
}
