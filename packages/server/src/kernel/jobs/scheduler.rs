//! Producer side of the job queue plus completion/retry resolution.
//!
//! Fire times are always recomputed from the patient's wall clock in their
//! IANA timezone, so a daily job stays at the same local time across DST
//! transitions instead of drifting by the offset delta.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{JobStatus, JobType, ScheduledJob};

/// Upper bound of the random jitter added to scheduled fire times, to avoid
/// synchronized bursts across patients sharing a preferred time.
pub const JITTER_MAX_SECS: i64 = 300;

/// Fixed delay before a failed job is retried.
pub const RETRY_BACKOFF_MINUTES: i64 = 5;

/// Compute the next absolute UTC instant at which `local_time` occurs in
/// `timezone`, strictly after `after`.
///
/// The offset is resolved from the target local date each time. A wall-clock
/// time erased by a spring-forward gap resolves one hour later; an ambiguous
/// fall-back time resolves to its first occurrence.
pub fn next_occurrence(
    local_time: NaiveTime,
    timezone: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| anyhow!("invalid timezone: {}", timezone))?;

    let mut date = after.with_timezone(&tz).date_naive();

    // The target is always today or tomorrow; the third iteration only
    // exists to absorb a gap resolution landing in the past.
    for _ in 0..3 {
        let naive = date.and_time(local_time);
        let resolved = match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => Some(dt),
            chrono::LocalResult::Ambiguous(first, _) => Some(first),
            chrono::LocalResult::None => {
                tz.from_local_datetime(&(naive + Duration::hours(1))).earliest()
            }
        };

        if let Some(dt) = resolved {
            let instant = dt.with_timezone(&Utc);
            if instant > after {
                return Ok(instant);
            }
        }

        date = date
            .succ_opt()
            .ok_or_else(|| anyhow!("date overflow computing next occurrence"))?;
    }

    bail!("could not resolve next occurrence in {}", timezone)
}

/// Add 0-300 seconds of uniform random jitter to a fire time.
pub fn with_jitter(instant: DateTime<Utc>) -> DateTime<Utc> {
    let offset = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
    instant + Duration::seconds(offset)
}

/// Insert a daily-recurring check-in job firing at the patient's preferred
/// local time.
pub async fn schedule_recurring(
    patient_id: Uuid,
    local_time: NaiveTime,
    timezone: &str,
    pool: &PgPool,
) -> Result<ScheduledJob> {
    let fire_at = with_jitter(next_occurrence(local_time, timezone, Utc::now())?);

    let job = ScheduledJob::daily(
        patient_id,
        JobType::DailyCheckin,
        fire_at,
        local_time,
        timezone,
    )
    .insert(pool)
    .await?;

    info!(
        job_id = %job.id,
        patient_id = %patient_id,
        scheduled_for = %job.scheduled_for,
        timezone = %timezone,
        "scheduled recurring daily check-in"
    );

    Ok(job)
}

/// Insert a one-shot job.
pub async fn schedule_one_shot(
    patient_id: Uuid,
    job_type: JobType,
    when: DateTime<Utc>,
    payload: Option<serde_json::Value>,
    pool: &PgPool,
) -> Result<ScheduledJob> {
    let job = ScheduledJob::one_shot(patient_id, job_type, when, payload)
        .insert(pool)
        .await?;

    info!(
        job_id = %job.id,
        patient_id = %patient_id,
        job_type = ?job.job_type,
        scheduled_for = %job.scheduled_for,
        "scheduled one-shot job"
    );

    Ok(job)
}

/// Cancel every pending job for a patient (pause/unsubscribe path).
///
/// Cancelled is terminal; these rows are never reconsidered by a claim.
pub async fn cancel_all(patient_id: Uuid, pool: &PgPool) -> Result<u64> {
    let cancelled = sqlx::query(
        "UPDATE scheduled_jobs
         SET status = 'cancelled', updated_at = NOW()
         WHERE patient_id = $1 AND status = 'pending'",
    )
    .bind(patient_id)
    .execute(pool)
    .await?
    .rows_affected();

    if cancelled > 0 {
        info!(patient_id = %patient_id, count = cancelled, "cancelled pending jobs");
    }

    Ok(cancelled)
}

/// Mark a claimed job completed; for daily recurrence, atomically insert
/// tomorrow's occurrence from the same local-time/timezone inputs.
pub async fn mark_completed(job: &ScheduledJob, pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE scheduled_jobs
         SET status = 'completed', lease_expires_at = NULL, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(job.id)
    .execute(&mut *tx)
    .await?;

    if job.is_recurring() {
        let local_time = job
            .local_time
            .ok_or_else(|| anyhow!("recurring job {} has no local_time", job.id))?;
        let next = with_jitter(next_occurrence(local_time, &job.timezone, Utc::now())?);

        sqlx::query(
            "INSERT INTO scheduled_jobs (
                id, patient_id, job_type, status, scheduled_for, payload,
                attempts, max_attempts, last_error, recurrence, local_time, timezone
             )
             VALUES ($1, $2, $3, 'pending', $4, $5, 0, $6, NULL, $7, $8, $9)",
        )
        .bind(Uuid::new_v4())
        .bind(job.patient_id)
        .bind(job.job_type)
        .bind(next)
        .bind(&job.payload)
        .bind(job.max_attempts)
        .bind(&job.recurrence)
        .bind(local_time)
        .bind(&job.timezone)
        .execute(&mut *tx)
        .await?;

        info!(
            job_id = %job.id,
            next_run_at = %next,
            "scheduled next occurrence for recurring job"
        );
    }

    tx.commit().await?;
    Ok(())
}

/// Record a handler failure: retry with fixed backoff while attempts remain,
/// otherwise fail permanently.
pub async fn mark_failed(job: &ScheduledJob, error: &str, pool: &PgPool) -> Result<JobStatus> {
    let attempts = job.attempts + 1;

    if attempts < job.max_attempts {
        sqlx::query(
            "UPDATE scheduled_jobs
             SET status = 'pending',
                 attempts = $2,
                 last_error = $3,
                 scheduled_for = NOW() + make_interval(mins => $4),
                 lease_expires_at = NULL,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(attempts)
        .bind(error)
        .bind(RETRY_BACKOFF_MINUTES as i32)
        .execute(pool)
        .await?;

        warn!(
            job_id = %job.id,
            job_type = ?job.job_type,
            attempts,
            error = %error,
            "job failed, retrying with backoff"
        );

        Ok(JobStatus::Pending)
    } else {
        sqlx::query(
            "UPDATE scheduled_jobs
             SET status = 'failed',
                 attempts = $2,
                 last_error = $3,
                 lease_expires_at = NULL,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(attempts)
        .bind(error)
        .execute(pool)
        .await?;

        error!(
            job_id = %job.id,
            job_type = ?job.job_type,
            attempts,
            error = %error,
            "job failed permanently"
        );

        Ok(JobStatus::Failed)
    }
}
