//! Missed-streak escalation: nudge at three missed days, dormancy at five.

use anyhow::Result;
use tracing::info;

use crate::domains::engagement::prompts;
use crate::domains::patients::{state_machine, PatientState, TriggerType, TransitionUpdates};
use crate::kernel::jobs::{scheduler, ScheduledJob};
use crate::kernel::ServerKernel;

use super::{load_patient, HandlerOutcome, DORMANT_AFTER_MISSED, NUDGE_AFTER_MISSED};

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    let patient = load_patient(kernel, job).await?;

    if patient.state != PatientState::DailyActive {
        return Ok(HandlerOutcome::Skipped("patient not in daily tracking"));
    }

    // The streak may have been broken by a reply between scheduling and
    // execution; re-read it fresh and act on what's true now.
    if patient.consecutive_missed >= DORMANT_AFTER_MISSED {
        state_machine::transition(
            patient.id,
            PatientState::Dormant,
            TriggerType::ScheduledJob,
            "re-engagement: missed-day streak reached dormancy threshold",
            TransitionUpdates::none().clear_pending(),
            &kernel.db_pool,
        )
        .await?;

        let cancelled = scheduler::cancel_all(patient.id, &kernel.db_pool).await?;
        info!(
            patient_id = %patient.id,
            cancelled,
            "patient moved to dormant, pending jobs cancelled"
        );

        kernel
            .sms
            .send(&patient.phone_number, prompts::DORMANT_NOTICE)
            .await?;
        return Ok(HandlerOutcome::Completed);
    }

    if patient.consecutive_missed >= NUDGE_AFTER_MISSED {
        kernel
            .sms
            .send(&patient.phone_number, prompts::RE_ENGAGEMENT_NUDGE)
            .await?;
        return Ok(HandlerOutcome::Completed);
    }

    Ok(HandlerOutcome::Skipped("missed-day streak already broken"))
}
