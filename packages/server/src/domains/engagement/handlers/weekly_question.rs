//! Weekly rotating question: sprint days 7/14/21/28 during daily tracking,
//! plus the standing 7-day cadence once a patient moves to weekly check-ins.

use anyhow::Result;
use chrono::{Datelike, Duration, Utc};

use crate::domains::engagement::prompts;
use crate::domains::patients::{Patient, PatientState, PendingQuestion};
use crate::kernel::jobs::{scheduler, JobType, ScheduledJob};
use crate::kernel::ServerKernel;

use super::{load_patient, HandlerOutcome, WEEKLY_QUESTION_DAYS};

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    let patient = load_patient(kernel, job).await?;

    let rotation = match patient.state {
        // Fixed day-of-sprint rotation: days 7/14/21/28 map onto the three
        // rotating question kinds.
        PatientState::DailyActive => {
            match WEEKLY_QUESTION_DAYS
                .iter()
                .position(|d| *d == patient.day_count)
            {
                Some(rotation) => rotation,
                None => return Ok(HandlerOutcome::Skipped("not a weekly question day")),
            }
        }
        // Standing cadence: no sprint to anchor on, so rotate by calendar
        // week and chain next week's occurrence.
        PatientState::Weekly => {
            chain_next_week(kernel, &patient).await?;
            Utc::now().iso_week().week() as usize
        }
        _ => return Ok(HandlerOutcome::Skipped("patient not actively tracking")),
    };

    kernel
        .sms
        .send(&patient.phone_number, prompts::weekly_question(rotation))
        .await?;

    Patient::set_pending(
        patient.id,
        Some(PendingQuestion::WeeklyQuestion),
        None,
        &kernel.db_pool,
    )
    .await?;

    Ok(HandlerOutcome::Completed)
}

/// Keep exactly one future weekly question pending, so a retried send never
/// stacks extra occurrences.
async fn chain_next_week(kernel: &ServerKernel, patient: &Patient) -> Result<()> {
    let pending =
        ScheduledJob::find_pending(patient.id, JobType::WeeklyQuestion, &kernel.db_pool).await?;
    if !pending.is_empty() {
        return Ok(());
    }

    scheduler::schedule_one_shot(
        patient.id,
        JobType::WeeklyQuestion,
        scheduler::with_jitter(Utc::now() + Duration::days(7)),
        None,
        &kernel.db_pool,
    )
    .await?;
    Ok(())
}
