//! Inbound SMS conversation routing.
//!
//! Every inbound message is handled statelessly: the patient row is read
//! fresh, the reply is routed on (lifecycle state, pending question), and
//! all mutation goes through the state machine or the idempotent entry
//! upsert. Duplicate webhook deliveries are dropped on the provider
//! message id before any routing happens; a delivery whose routing fails
//! releases its dedup row so the gateway's redelivery is reprocessed
//! rather than swallowed.

use anyhow::Result;
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::common::phone;
use crate::domains::classification::{self, ClassificationAction, ClassificationOutcome};
use crate::domains::engagement::handlers::{INSIGHT_DAYS, WEEKLY_QUESTION_DAYS};
use crate::domains::engagement::prompts;
use crate::domains::patients::{
    state_machine, Patient, PatientState, PendingQuestion, TriggerType, TransitionUpdates,
};
use crate::domains::sprints::{DailyEntry, ResponseMethod, Sprint};
use crate::kernel::jobs::{scheduler, JobType};
use crate::kernel::ServerKernel;

/// Default tracking-period length opened on activation.
pub const SPRINT_TARGET_DAYS: i32 = 30;

const STOP_KEYWORDS: [&str; 6] = ["stop", "stopall", "unsubscribe", "cancel", "end", "quit"];

/// One inbound message as delivered by the SMS gateway webhook.
#[derive(Debug, Clone)]
pub struct InboundSms {
    pub from_address: String,
    pub text: String,
    pub provider_message_id: String,
}

/// Record the raw message, keyed uniquely on the provider's message id.
/// Returns false when this delivery is a duplicate.
async fn record_if_new(msg: &InboundSms, pool: &PgPool) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO inbound_messages (provider_message_id, from_address, body)
         VALUES ($1, $2, $3)
         ON CONFLICT (provider_message_id) DO NOTHING",
    )
    .bind(&msg.provider_message_id)
    .bind(&msg.from_address)
    .bind(&msg.text)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Drop the dedup row after a failed routing attempt, so the gateway's
/// redelivery of the same message id is not mistaken for a duplicate.
async fn release_for_redelivery(msg: &InboundSms, pool: &PgPool) {
    let released = sqlx::query("DELETE FROM inbound_messages WHERE provider_message_id = $1")
        .bind(&msg.provider_message_id)
        .execute(pool)
        .await;

    if let Err(e) = released {
        // Worst case the redelivery is dropped as a duplicate and the
        // reply is lost; make that loud.
        error!(
            provider_message_id = %msg.provider_message_id,
            error = %e,
            "DEDUP RELEASE FAILED: redelivery of this message will be dropped"
        );
    }
}

/// Route one inbound message. Idempotent under duplicate delivery.
pub async fn handle_inbound(kernel: &ServerKernel, msg: InboundSms) -> Result<()> {
    if !record_if_new(&msg, &kernel.db_pool).await? {
        info!(
            provider_message_id = %msg.provider_message_id,
            "duplicate inbound delivery dropped"
        );
        return Ok(());
    }

    match route_reply(kernel, &msg).await {
        Ok(()) => Ok(()),
        Err(e) => {
            release_for_redelivery(&msg, &kernel.db_pool).await;
            Err(e)
        }
    }
}

async fn route_reply(kernel: &ServerKernel, msg: &InboundSms) -> Result<()> {
    let phone = phone::normalize(&msg.from_address)?;
    let Some(patient) = Patient::find_by_phone(&phone, &kernel.db_pool).await? else {
        info!(from = %phone, "inbound message from unknown number ignored");
        return Ok(());
    };

    let text = msg.text.trim();
    let lowered = text.to_lowercase();

    // Regulatory stop: honored from every state before any other routing.
    if STOP_KEYWORDS.contains(&lowered.as_str()) {
        return handle_stop(kernel, &patient).await;
    }

    if patient.state == PatientState::Unsubscribed {
        // Terminal: no replies, not even help text.
        return Ok(());
    }

    match (patient.state, patient.pending_question) {
        (PatientState::Onboarding, _) => handle_onboarding_reply(kernel, &patient, &lowered).await,
        (PatientState::Dormant, _) => handle_dormant_reply(kernel, &patient, &lowered).await,
        (_, Some(PendingQuestion::ClarifyLevel)) => {
            handle_clarify_reply(kernel, &patient, text, &lowered).await
        }
        (_, Some(PendingQuestion::TransitionChoice)) => {
            handle_transition_choice(kernel, &patient, &lowered).await
        }
        (_, Some(PendingQuestion::WeeklyQuestion)) => {
            handle_weekly_reply(kernel, &patient, text).await
        }
        (PatientState::DailyActive, _) => handle_checkin_reply(kernel, &patient, text).await,
        _ => {
            kernel
                .sms
                .send(&patient.phone_number, prompts::GENERIC_HELP)
                .await?;
            Ok(())
        }
    }
}

async fn handle_stop(kernel: &ServerKernel, patient: &Patient) -> Result<()> {
    state_machine::transition(
        patient.id,
        PatientState::Unsubscribed,
        TriggerType::InboundSms,
        "patient texted a stop keyword",
        TransitionUpdates::none().clear_pending(),
        &kernel.db_pool,
    )
    .await?;

    let cancelled = scheduler::cancel_all(patient.id, &kernel.db_pool).await?;
    info!(patient_id = %patient.id, cancelled, "patient unsubscribed");

    kernel
        .sms
        .send(&patient.phone_number, prompts::STOP_CONFIRMATION)
        .await?;
    Ok(())
}

async fn handle_onboarding_reply(
    kernel: &ServerKernel,
    patient: &Patient,
    lowered: &str,
) -> Result<()> {
    if !matches!(lowered, "yes" | "y" | "start") {
        kernel
            .sms
            .send(&patient.phone_number, prompts::ONBOARDING_CONSENT)
            .await?;
        return Ok(());
    }

    activate(kernel, patient, "patient confirmed onboarding consent").await?;
    Ok(())
}

async fn handle_dormant_reply(
    kernel: &ServerKernel,
    patient: &Patient,
    lowered: &str,
) -> Result<()> {
    if !matches!(lowered, "restart" | "start" | "yes") {
        kernel
            .sms
            .send(&patient.phone_number, prompts::DORMANT_HELP)
            .await?;
        return Ok(());
    }

    activate(kernel, patient, "dormant patient asked to restart").await?;
    Ok(())
}

/// Move a patient into daily tracking: fresh sprint, day counter reset,
/// recurring check-in scheduled, welcome sent.
async fn activate(kernel: &ServerKernel, patient: &Patient, detail: &str) -> Result<()> {
    state_machine::transition(
        patient.id,
        PatientState::DailyActive,
        TriggerType::InboundSms,
        detail,
        TransitionUpdates::none()
            .with_day_count(1)
            .with_consecutive_missed(0)
            .clear_pending(),
        &kernel.db_pool,
    )
    .await?;

    Sprint::start_new(patient.id, SPRINT_TARGET_DAYS, &kernel.db_pool).await?;

    scheduler::schedule_recurring(
        patient.id,
        patient.preferred_time,
        &patient.timezone,
        &kernel.db_pool,
    )
    .await?;

    kernel
        .sms
        .send(&patient.phone_number, prompts::WELCOME)
        .await?;
    Ok(())
}

/// The pipeline-driven check-in path: classify, then route the outcome.
async fn handle_checkin_reply(kernel: &ServerKernel, patient: &Patient, text: &str) -> Result<()> {
    let Some(outcome) = classification::classify(text, kernel.classifier.as_ref()).await else {
        kernel
            .sms
            .send(&patient.phone_number, prompts::FULL_SCALE)
            .await?;
        return Ok(());
    };

    match outcome.action {
        ClassificationAction::Accept => {
            record_entry(kernel, patient, &outcome).await?;
        }
        ClassificationAction::Clarify => {
            Patient::set_pending(
                patient.id,
                Some(PendingQuestion::ClarifyLevel),
                Some(outcome.level),
                &kernel.db_pool,
            )
            .await?;
            kernel
                .sms
                .send(&patient.phone_number, &prompts::clarify(outcome.level))
                .await?;
        }
        ClassificationAction::Reprompt => {
            kernel
                .sms
                .send(&patient.phone_number, prompts::FULL_SCALE)
                .await?;
        }
    }
    Ok(())
}

/// Resolve a pending clarification: YES accepts the stashed level, a bare
/// digit accepts that digit, anything else re-prompts the full scale.
async fn handle_clarify_reply(
    kernel: &ServerKernel,
    patient: &Patient,
    text: &str,
    lowered: &str,
) -> Result<()> {
    if matches!(lowered, "yes" | "y") {
        let Some(level) = patient.pending_level else {
            warn!(patient_id = %patient.id, "clarify pending without a stashed level");
            kernel
                .sms
                .send(&patient.phone_number, prompts::FULL_SCALE)
                .await?;
            return Ok(());
        };
        let confirmed = ClassificationOutcome {
            level,
            confidence: 1.0,
            method: ResponseMethod::Clarified,
            action: ClassificationAction::Accept,
            rationale: None,
        };
        return record_entry(kernel, patient, &confirmed).await;
    }

    if let Ok(level) = text.parse::<i32>() {
        if (1..=5).contains(&level) {
            let corrected = ClassificationOutcome {
                level,
                confidence: 1.0,
                method: ResponseMethod::Numeric,
                action: ClassificationAction::Accept,
                rationale: None,
            };
            return record_entry(kernel, patient, &corrected).await;
        }
    }

    kernel
        .sms
        .send(&patient.phone_number, prompts::FULL_SCALE)
        .await?;
    Ok(())
}

/// End-of-sprint choice: 1 restarts daily tracking, 2 moves to weekly
/// check-ins, 3 moves to treatment discussion.
async fn handle_transition_choice(
    kernel: &ServerKernel,
    patient: &Patient,
    lowered: &str,
) -> Result<()> {
    match lowered {
        "1" => {
            activate(kernel, patient, "patient chose another tracking period").await?;
        }
        "2" => {
            state_machine::transition(
                patient.id,
                PatientState::Weekly,
                TriggerType::InboundSms,
                "patient chose weekly check-ins",
                TransitionUpdates::none().clear_pending(),
                &kernel.db_pool,
            )
            .await?;
            // The sprint's pending jobs were cancelled at transition entry;
            // this one-shot starts the standing weekly cadence, which the
            // weekly handler then chains forward week by week.
            scheduler::schedule_one_shot(
                patient.id,
                JobType::WeeklyQuestion,
                scheduler::with_jitter(Utc::now() + Duration::days(7)),
                None,
                &kernel.db_pool,
            )
            .await?;
            kernel
                .sms
                .send(&patient.phone_number, prompts::WEEKLY_CADENCE_CONFIRMATION)
                .await?;
        }
        "3" => {
            state_machine::transition(
                patient.id,
                PatientState::Treatment,
                TriggerType::InboundSms,
                "patient chose to discuss treatment",
                TransitionUpdates::none().clear_pending(),
                &kernel.db_pool,
            )
            .await?;
            scheduler::schedule_one_shot(
                patient.id,
                JobType::ReportGeneration,
                Utc::now(),
                None,
                &kernel.db_pool,
            )
            .await?;
            kernel
                .sms
                .send(&patient.phone_number, prompts::TREATMENT_CONFIRMATION)
                .await?;
        }
        _ => {
            kernel
                .sms
                .send(&patient.phone_number, prompts::TRANSITION_OPTIONS)
                .await?;
        }
    }
    Ok(())
}

/// Weekly questions are free-text; the answer is acknowledged and logged,
/// not classified.
async fn handle_weekly_reply(kernel: &ServerKernel, patient: &Patient, text: &str) -> Result<()> {
    info!(patient_id = %patient.id, answer = %text, "weekly question answered");

    Patient::set_pending(patient.id, None, None, &kernel.db_pool).await?;
    kernel
        .sms
        .send(&patient.phone_number, prompts::WEEKLY_ACK)
        .await?;
    Ok(())
}

/// Record an accepted level for today and advance the day counters.
///
/// A second accepted reply on the same day overwrites the entry (idempotent
/// upsert) without advancing the counters again. Crossing a weekly-question,
/// insight, or end-of-sprint day queues the follow-on job.
async fn record_entry(
    kernel: &ServerKernel,
    patient: &Patient,
    outcome: &ClassificationOutcome,
) -> Result<()> {
    let sprint = match Sprint::find_active(patient.id, &kernel.db_pool).await? {
        Some(sprint) => sprint,
        None => Sprint::start_new(patient.id, SPRINT_TARGET_DAYS, &kernel.db_pool).await?,
    };

    let tz: Tz = patient
        .timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("patient {} has invalid timezone", patient.id))?;
    let today = Utc::now().with_timezone(&tz).date_naive();

    let first_entry_today =
        !DailyEntry::exists_for_date(patient.id, sprint.id, today, &kernel.db_pool).await?;

    DailyEntry::upsert(
        patient.id,
        sprint.id,
        today,
        outcome.level,
        outcome.method,
        outcome.confidence,
        None,
        &kernel.db_pool,
    )
    .await?;

    let day_count = if first_entry_today {
        Sprint::increment_completed(sprint.id, &kernel.db_pool).await?;
        patient.day_count + 1
    } else {
        patient.day_count
    };

    // Same-state daily recurrence: stay active for another day with the
    // missed streak broken and the pending question resolved.
    state_machine::transition(
        patient.id,
        PatientState::DailyActive,
        TriggerType::InboundSms,
        "daily entry recorded",
        TransitionUpdates::none()
            .with_day_count(day_count)
            .with_consecutive_missed(0)
            .clear_pending(),
        &kernel.db_pool,
    )
    .await?;

    kernel
        .sms
        .send(&patient.phone_number, &prompts::checkin_ack(outcome.level))
        .await?;

    if first_entry_today {
        queue_follow_ons(kernel, patient, &sprint, day_count).await?;
    }
    Ok(())
}

/// Queue milestone jobs that become due once today's entry lands.
async fn queue_follow_ons(
    kernel: &ServerKernel,
    patient: &Patient,
    sprint: &Sprint,
    day_count: i32,
) -> Result<()> {
    if WEEKLY_QUESTION_DAYS.contains(&day_count) {
        scheduler::schedule_one_shot(
            patient.id,
            JobType::WeeklyQuestion,
            Utc::now(),
            None,
            &kernel.db_pool,
        )
        .await?;
    }

    if INSIGHT_DAYS.contains(&day_count) {
        scheduler::schedule_one_shot(
            patient.id,
            JobType::Insight,
            Utc::now(),
            None,
            &kernel.db_pool,
        )
        .await?;
    }

    if day_count >= sprint.target_days {
        scheduler::schedule_one_shot(
            patient.id,
            JobType::Transition,
            Utc::now(),
            None,
            &kernel.db_pool,
        )
        .await?;
    }
    Ok(())
}
