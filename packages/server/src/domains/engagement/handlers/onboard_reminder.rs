//! Reminder for patients who never confirmed onboarding consent.

use anyhow::Result;

use crate::domains::engagement::prompts;
use crate::domains::patients::PatientState;
use crate::kernel::jobs::ScheduledJob;
use crate::kernel::ServerKernel;

use super::{load_patient, HandlerOutcome};

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    let patient = load_patient(kernel, job).await?;

    if patient.state != PatientState::Onboarding {
        return Ok(HandlerOutcome::Skipped("patient already past onboarding"));
    }

    kernel
        .sms
        .send(&patient.phone_number, prompts::ONBOARD_REMINDER)
        .await?;

    Ok(HandlerOutcome::Completed)
}
