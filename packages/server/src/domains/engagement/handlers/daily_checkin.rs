//! Daily check-in prompt.
//!
//! Also owns the missed-day rollover: if yesterday's prompt is still
//! unanswered when today's fires, the missed counters advance and a
//! re-engagement job is queued once the streak crosses the nudge threshold.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::domains::engagement::prompts;
use crate::domains::patients::{Patient, PatientState, PendingQuestion};
use crate::domains::sprints::{DailyEntry, Sprint};
use crate::kernel::jobs::{scheduler, JobType, ScheduledJob};
use crate::kernel::ServerKernel;

use super::{load_patient, local_today, HandlerOutcome, NUDGE_AFTER_MISSED};

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    let patient = load_patient(kernel, job).await?;

    if patient.state != PatientState::DailyActive {
        return Ok(HandlerOutcome::Skipped("patient not in daily tracking"));
    }

    let Some(sprint) = Sprint::find_active(patient.id, &kernel.db_pool).await? else {
        return Ok(HandlerOutcome::Skipped("no active sprint"));
    };

    let today = local_today(&patient)?;

    // Proactive reply already recorded today: nothing to prompt.
    if DailyEntry::exists_for_date(patient.id, sprint.id, today, &kernel.db_pool).await? {
        return Ok(HandlerOutcome::Skipped("entry already recorded today"));
    }

    // Yesterday's prompt went unanswered: advance the missed counters
    // before prompting again.
    if patient.pending_question == Some(PendingQuestion::DailyCheckin) {
        let updated = Patient::increment_missed(patient.id, &kernel.db_pool).await?;
        Sprint::increment_missed(sprint.id, &kernel.db_pool).await?;

        info!(
            patient_id = %patient.id,
            consecutive_missed = updated.consecutive_missed,
            "daily check-in went unanswered"
        );

        if updated.consecutive_missed >= NUDGE_AFTER_MISSED {
            let already_queued =
                ScheduledJob::find_pending(patient.id, JobType::ReEngagement, &kernel.db_pool)
                    .await?;
            if already_queued.is_empty() {
                scheduler::schedule_one_shot(
                    patient.id,
                    JobType::ReEngagement,
                    Utc::now(),
                    None,
                    &kernel.db_pool,
                )
                .await?;
            }
        }
    }

    kernel
        .sms
        .send(&patient.phone_number, prompts::DAILY_CHECKIN)
        .await?;

    Patient::set_pending(
        patient.id,
        Some(PendingQuestion::DailyCheckin),
        None,
        &kernel.db_pool,
    )
    .await?;

    Ok(HandlerOutcome::Completed)
}
