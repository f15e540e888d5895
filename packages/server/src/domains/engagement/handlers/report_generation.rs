//! Clinician report generation, delegated to the report service.

use anyhow::Result;

use crate::kernel::jobs::ScheduledJob;
use crate::kernel::ServerKernel;

use super::HandlerOutcome;

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    kernel.reports.generate(job.patient_id).await?;
    Ok(HandlerOutcome::Completed)
}
