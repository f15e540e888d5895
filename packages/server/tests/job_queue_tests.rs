//! Integration tests for the Postgres-backed job queue: claim exclusivity,
//! lease recovery, retry/backoff resolution, and cancellation.

mod common;

use crate::common::{create_due_job, create_patient_in_state, TestHarness};
use chrono::{Duration, Utc};
use server_core::domains::patients::PatientState;
use server_core::kernel::jobs::{scheduler, JobStatus, JobType, ScheduledJob};
use test_context::test_context;
use uuid::Uuid;

/// Two concurrent claims must never hand out the same job.
#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_claims_are_disjoint(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();

    let mut ours = Vec::new();
    for _ in 0..5 {
        let job = create_due_job(&ctx.db_pool, patient.id, JobType::Insight)
            .await
            .unwrap();
        ours.push(job.id);
    }

    let (first, second) = tokio::join!(
        ScheduledJob::claim_due(100, &ctx.db_pool),
        ScheduledJob::claim_due(100, &ctx.db_pool),
    );
    let first: Vec<Uuid> = first.unwrap().into_iter().map(|j| j.id).collect();
    let second: Vec<Uuid> = second.unwrap().into_iter().map(|j| j.id).collect();

    for id in &first {
        assert!(!second.contains(id), "job {} claimed twice", id);
    }

    // Every one of our jobs ended up claimed.
    for id in ours {
        let job = ScheduledJob::find_by_id(id, &ctx.db_pool).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.lease_expires_at.is_some());
    }
}

/// A job claimed moments ago holds its lease; a later claim skips it.
#[test_context(TestHarness)]
#[tokio::test]
async fn fresh_claim_is_not_reclaimable(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let job = create_due_job(&ctx.db_pool, patient.id, JobType::Insight)
        .await
        .unwrap();

    ScheduledJob::claim_due(100, &ctx.db_pool).await.unwrap();
    let claimed = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(claimed.status, JobStatus::Processing);
    let lease = claimed.lease_expires_at.expect("lease must be set");

    let reclaimed = ScheduledJob::claim_due(100, &ctx.db_pool).await.unwrap();
    assert!(
        !reclaimed.iter().any(|j| j.id == job.id),
        "live claim was handed out twice"
    );

    let after = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(after.lease_expires_at, Some(lease));
}

/// A processing row whose worker died past its lease is picked back up by
/// the next claim instead of staying stranded forever.
#[test_context(TestHarness)]
#[tokio::test]
async fn expired_lease_is_recovered_by_the_next_claim(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let job = create_due_job(&ctx.db_pool, patient.id, JobType::Insight)
        .await
        .unwrap();

    // A claim whose worker crashed: processing, lease already expired.
    sqlx::query(
        "UPDATE scheduled_jobs
         SET status = 'processing', lease_expires_at = NOW() - interval '1 minute'
         WHERE id = $1",
    )
    .bind(job.id)
    .execute(&ctx.db_pool)
    .await
    .unwrap();

    ScheduledJob::claim_due(100, &ctx.db_pool).await.unwrap();

    let recovered = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(recovered.status, JobStatus::Processing);
    assert!(
        recovered.lease_expires_at.expect("lease must be renewed") > Utc::now(),
        "recovered claim must carry a fresh lease"
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failure_with_attempts_left_retries_with_backoff(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let job = create_due_job(&ctx.db_pool, patient.id, JobType::Insight)
        .await
        .unwrap();

    let resolved = scheduler::mark_failed(&job, "sms gateway 503", &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(resolved, JobStatus::Pending);

    let row = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(row.status, JobStatus::Pending);
    assert_eq!(row.attempts, 1);
    assert_eq!(row.last_error.as_deref(), Some("sms gateway 503"));
    assert!(row.scheduled_for > Utc::now(), "retry must be in the future");
    assert!(row.lease_expires_at.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn exhausted_attempts_fail_permanently_and_never_reclaim(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let mut job = ScheduledJob::one_shot(
        patient.id,
        JobType::Insight,
        Utc::now() - Duration::minutes(5),
        None,
    );
    job.attempts = job.max_attempts - 1;
    let job = job.insert(&ctx.db_pool).await.unwrap();

    let resolved = scheduler::mark_failed(&job, "sms gateway 503", &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(resolved, JobStatus::Failed);

    let row = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(row.status, JobStatus::Failed);
    assert_eq!(row.attempts, row.max_attempts);

    let claimed = ScheduledJob::claim_due(100, &ctx.db_pool).await.unwrap();
    assert!(!claimed.iter().any(|j| j.id == job.id));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn completing_a_recurring_job_inserts_the_next_occurrence(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let job = scheduler::schedule_recurring(
        patient.id,
        patient.preferred_time,
        &patient.timezone,
        &ctx.db_pool,
    )
    .await
    .unwrap();

    scheduler::mark_completed(&job, &ctx.db_pool).await.unwrap();

    let row = ScheduledJob::find_by_id(job.id, &ctx.db_pool).await.unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    assert!(row.lease_expires_at.is_none());

    let pending = ScheduledJob::find_pending(patient.id, JobType::DailyCheckin, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].scheduled_for > Utc::now());
    assert!(pending[0].is_recurring());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_all_only_touches_pending_jobs(ctx: &TestHarness) {
    let patient = create_patient_in_state(&ctx.db_pool, PatientState::DailyActive)
        .await
        .unwrap();
    let pending = ScheduledJob::one_shot(
        patient.id,
        JobType::Insight,
        Utc::now() + Duration::hours(1),
        None,
    )
    .insert(&ctx.db_pool)
    .await
    .unwrap();
    let completed = ScheduledJob::one_shot(
        patient.id,
        JobType::Insight,
        Utc::now() + Duration::hours(2),
        None,
    )
    .insert(&ctx.db_pool)
    .await
    .unwrap();
    scheduler::mark_completed(&completed, &ctx.db_pool)
        .await
        .unwrap();

    let cancelled = scheduler::cancel_all(patient.id, &ctx.db_pool).await.unwrap();
    assert_eq!(cancelled, 1);

    let pending = ScheduledJob::find_by_id(pending.id, &ctx.db_pool).await.unwrap();
    assert_eq!(pending.status, JobStatus::Cancelled);
    let completed = ScheduledJob::find_by_id(completed.id, &ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
}
