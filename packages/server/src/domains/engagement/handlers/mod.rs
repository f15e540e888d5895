//! Job-type-specific handlers.
//!
//! Every handler is idempotent and precondition-guarded: it re-reads the
//! patient's current state fresh and returns `Skipped` (success, no side
//! effect) when the state no longer matches what the job assumed. The
//! enum-keyed match below is exhaustive, so a new job type cannot be
//! forgotten.

mod daily_checkin;
mod insight;
mod onboard_reminder;
mod re_engagement;
mod report_generation;
mod transition;
mod weekly_question;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::domains::patients::Patient;
use crate::kernel::jobs::{JobType, ScheduledJob};
use crate::kernel::ServerKernel;

/// Sprint days that trigger a weekly question.
pub const WEEKLY_QUESTION_DAYS: [i32; 4] = [7, 14, 21, 28];

/// Sprint days that trigger a data-driven insight message.
pub const INSIGHT_DAYS: [i32; 5] = [5, 10, 14, 21, 30];

/// Consecutive missed days that trigger a gentle nudge.
pub const NUDGE_AFTER_MISSED: i32 = 3;

/// Consecutive missed days after which the patient goes dormant.
pub const DORMANT_AFTER_MISSED: i32 = 5;

/// A handler's terminal result. Both variants resolve the job as completed;
/// `Skipped` carries the stale-job-guard reason for the logs.
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    Completed,
    Skipped(&'static str),
}

/// Execute the handler for a claimed job.
pub async fn execute(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    match job.job_type {
        JobType::DailyCheckin => daily_checkin::handle(kernel, job).await,
        JobType::WeeklyQuestion => weekly_question::handle(kernel, job).await,
        JobType::Insight => insight::handle(kernel, job).await,
        JobType::ReEngagement => re_engagement::handle(kernel, job).await,
        JobType::Transition => transition::handle(kernel, job).await,
        JobType::OnboardReminder => onboard_reminder::handle(kernel, job).await,
        JobType::ReportGeneration => report_generation::handle(kernel, job).await,
    }
}

/// Load the job's patient, which must exist (enforced by FK).
pub(crate) async fn load_patient(kernel: &ServerKernel, job: &ScheduledJob) -> Result<Patient> {
    Patient::find_by_id(job.patient_id, &kernel.db_pool)
        .await?
        .ok_or_else(|| anyhow!("patient {} missing for job {}", job.patient_id, job.id))
}

/// Today's date on the patient's wall clock.
pub(crate) fn local_today(patient: &Patient) -> Result<NaiveDate> {
    let tz: Tz = patient
        .timezone
        .parse()
        .map_err(|_| anyhow!("patient {} has invalid timezone {}", patient.id, patient.timezone))?;
    Ok(chrono::Utc::now().with_timezone(&tz).date_naive())
}
