//! End-of-sprint transition: close out the sprint and offer next steps.

use anyhow::Result;

use crate::domains::engagement::prompts;
use crate::domains::patients::{
    state_machine, PatientState, PendingQuestion, TriggerType, TransitionUpdates,
};
use crate::domains::sprints::Sprint;
use crate::kernel::jobs::{scheduler, ScheduledJob};
use crate::kernel::ServerKernel;

use super::{load_patient, HandlerOutcome};

pub async fn handle(kernel: &ServerKernel, job: &ScheduledJob) -> Result<HandlerOutcome> {
    let patient = load_patient(kernel, job).await?;

    if patient.state != PatientState::DailyActive {
        return Ok(HandlerOutcome::Skipped("patient not in daily tracking"));
    }

    if let Some(sprint) = Sprint::find_active(patient.id, &kernel.db_pool).await? {
        Sprint::mark_completed(sprint.id, &kernel.db_pool).await?;
    }

    // The daily recurrence stops here; whichever option the patient picks
    // schedules its own cadence.
    scheduler::cancel_all(patient.id, &kernel.db_pool).await?;

    state_machine::transition(
        patient.id,
        PatientState::Transition,
        TriggerType::ScheduledJob,
        "sprint complete, awaiting next-step choice",
        TransitionUpdates::none().with_pending(PendingQuestion::TransitionChoice, None),
        &kernel.db_pool,
    )
    .await?;

    kernel
        .sms
        .send(&patient.phone_number, prompts::TRANSITION_OPTIONS)
        .await?;

    Ok(HandlerOutcome::Completed)
}
