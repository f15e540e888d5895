//! Integration tests for inbound message routing: webhook dedup, redelivery
//! after a failed attempt, the regulatory stop, and the end-of-sprint choice.

mod common;

use crate::common::{create_active_sprint, create_patient_in_state, unique_phone, TestHarness};
use chrono::{Duration, Utc};
use server_core::domains::messaging::{handle_inbound, InboundSms};
use server_core::domains::patients::{Patient, PatientState, PendingQuestion};
use server_core::domains::sprints::DailyEntry;
use server_core::kernel::jobs::{JobStatus, JobType, ScheduledJob};
use server_core::kernel::test_dependencies::{MockClassifierService, MockSmsService};
use std::sync::Arc;
use uuid::Uuid;

use test_context::test_context;

fn msg_from(patient: &Patient, body: &str) -> InboundSms {
    InboundSms {
        from_address: patient.phone_number.clone(),
        text: body.to_string(),
        provider_message_id: format!("SM{}", Uuid::new_v4().simple()),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn duplicate_delivery_is_dropped_after_success(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let sprint = create_active_sprint(&ctx.db_pool, patient.id).await.unwrap();

    let sms = Arc::new(MockSmsService::new());
    let kernel = ctx.kernel_with(sms.clone(), Arc::new(MockClassifierService::new()));

    let msg = msg_from(&patient, "2");
    handle_inbound(&kernel, msg.clone()).await.unwrap();
    handle_inbound(&kernel, msg).await.unwrap();

    // The second delivery is a no-op: one ack, one entry, one day counted.
    assert_eq!(sms.send_count(), 1);
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM daily_entries WHERE sprint_id = $1")
            .bind(sprint.id)
            .fetch_one(&ctx.db_pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
    let row = Patient::find_by_id(patient.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.day_count, patient.day_count + 1);
}

/// A delivery whose processing fails must not poison its message id: the
/// gateway retries with the same id and the retry has to be processed.
#[test_context(TestHarness)]
#[tokio::test]
async fn failed_delivery_is_reprocessed_on_redelivery(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let sprint = create_active_sprint(&ctx.db_pool, patient.id).await.unwrap();

    let broken = ctx.kernel_with(
        Arc::new(MockSmsService::failing()),
        Arc::new(MockClassifierService::new()),
    );
    let msg = msg_from(&patient, "3");
    assert!(handle_inbound(&broken, msg.clone()).await.is_err());

    // Gateway redelivers the exact same message id once we are healthy.
    let sms = Arc::new(MockSmsService::new());
    let kernel = ctx.kernel_with(sms.clone(), Arc::new(MockClassifierService::new()));
    handle_inbound(&kernel, msg).await.unwrap();

    assert_eq!(sms.send_count(), 1, "the redelivery must be acknowledged");
    let today = Utc::now()
        .with_timezone(&chrono_tz::America::Chicago)
        .date_naive();
    let entry = DailyEntry::find_for_date(patient.id, sprint.id, today, &ctx.db_pool)
        .await
        .unwrap()
        .expect("the redelivered reply must be recorded");
    assert_eq!(entry.level, 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stop_keyword_unsubscribes_and_cancels_pending_jobs(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let job = ScheduledJob::one_shot(
        patient.id,
        JobType::DailyCheckin,
        Utc::now() + Duration::hours(1),
        None,
    )
    .insert(&ctx.db_pool)
    .await
    .unwrap();

    let sms = Arc::new(MockSmsService::new());
    let kernel = ctx.kernel_with(sms.clone(), Arc::new(MockClassifierService::new()));
    handle_inbound(&kernel, msg_from(&patient, "STOP")).await.unwrap();

    let row = Patient::find_by_id(patient.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state, PatientState::Unsubscribed);
    assert!(row.opted_out_at.is_some());

    let job = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(sms.send_count(), 1);
}

/// Choosing weekly check-ins at the end of a sprint must actually start the
/// weekly cadence, not just promise it.
#[test_context(TestHarness)]
#[tokio::test]
async fn weekly_choice_schedules_the_first_weekly_question(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::Transition)
        .await
        .unwrap();
    Patient::set_pending(
        patient.id,
        Some(PendingQuestion::TransitionChoice),
        None,
        &ctx.db_pool,
    )
    .await
    .unwrap();

    let sms = Arc::new(MockSmsService::new());
    let kernel = ctx.kernel_with(sms.clone(), Arc::new(MockClassifierService::new()));
    handle_inbound(&kernel, msg_from(&patient, "2")).await.unwrap();

    let row = Patient::find_by_id(patient.id, &ctx.db_pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.state, PatientState::Weekly);
    assert!(row.pending_question.is_none());

    let pending = ScheduledJob::find_pending(patient.id, JobType::WeeklyQuestion, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(
        pending[0].scheduled_for > Utc::now() + Duration::days(6),
        "first weekly question must land about a week out"
    );
    assert_eq!(sms.send_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_number_is_ignored(ctx: &TestHarness) {
    let sms = Arc::new(MockSmsService::new());
    let kernel = ctx.kernel_with(sms.clone(), Arc::new(MockClassifierService::new()));

    let msg = InboundSms {
        from_address: unique_phone(),
        text: "hello?".to_string(),
        provider_message_id: format!("SM{}", Uuid::new_v4().simple()),
    };
    handle_inbound(&kernel, msg).await.unwrap();

    assert_eq!(sms.send_count(), 0);
}
