//! Data-driven reflection at fixed sprint day offsets.

use anyhow::Result;

use crate::domains::engagement::prompts;
use crate::domains::patients::PatientState;
use crate::domains::sprints::Sprint;
use crate::kernel::jobs::ScheduledJob;
use crate::kernel::ServerKernel;

use super::{load_patient, HandlerOutcome, INSIGHT_DAYS};

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    let patient = load_patient(kernel, job).await?;

    if patient.state != PatientState::DailyActive {
        return Ok(HandlerOutcome::Skipped("patient not in daily tracking"));
    }

    if !INSIGHT_DAYS.contains(&patient.day_count) {
        return Ok(HandlerOutcome::Skipped("not an insight day"));
    }

    let Some(sprint) = Sprint::find_active(patient.id, &kernel.db_pool).await? else {
        return Ok(HandlerOutcome::Skipped("no active sprint"));
    };

    let body = prompts::insight(patient.day_count, sprint.days_completed, sprint.days_missed);
    kernel.sms.send(&patient.phone_number, &body).await?;

    Ok(HandlerOutcome::Completed)
}
