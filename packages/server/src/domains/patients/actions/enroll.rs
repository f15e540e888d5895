//! Enrollment: create the patient row and open the consent conversation.

use anyhow::Result;
use chrono::{Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::common::{phone, EngagementError};
use crate::domains::engagement::prompts;
use crate::domains::patients::{
    state_machine, Patient, PatientState, TriggerType, TransitionUpdates,
};
use crate::kernel::jobs::{scheduler, JobType};
use crate::kernel::ServerKernel;

/// How long an unconfirmed patient waits before the consent reminder.
const ONBOARD_REMINDER_AFTER_HOURS: i64 = 24;

/// Enroll a new patient: insert in `Enrolled`, move to `Onboarding` with
/// the consent ask, and queue a reminder for tomorrow in case they never
/// reply. Re-enrolling a known number is a validation error.
pub async fn enroll(
    kernel: &ServerKernel,
    phone_number: &str,
    preferred_time: NaiveTime,
    timezone: &str,
) -> Result<Patient> {
    let phone = phone::normalize(phone_number)?;

    timezone.parse::<Tz>().map_err(|_| {
        EngagementError::Validation(format!("unknown IANA timezone: {timezone}"))
    })?;

    if Patient::find_by_phone(&phone, &kernel.db_pool).await?.is_some() {
        return Err(
            EngagementError::Validation(format!("patient already enrolled: {phone}")).into(),
        );
    }

    let patient = Patient::insert(&phone, preferred_time, timezone, &kernel.db_pool).await?;

    let patient = state_machine::transition(
        patient.id,
        PatientState::Onboarding,
        TriggerType::System,
        "enrollment accepted, awaiting consent",
        TransitionUpdates::none(),
        &kernel.db_pool,
    )
    .await?;

    kernel
        .sms
        .send(&patient.phone_number, prompts::ONBOARDING_CONSENT)
        .await?;

    scheduler::schedule_one_shot(
        patient.id,
        JobType::OnboardReminder,
        Utc::now() + Duration::hours(ONBOARD_REMINDER_AFTER_HOURS),
        None,
        &kernel.db_pool,
    )
    .await?;

    info!(patient_id = %patient.id, "patient enrolled");
    Ok(patient)
}
