//! Scheduled job model and the atomic claim.

use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    DailyCheckin,
    WeeklyQuestion,
    Insight,
    ReEngagement,
    Transition,
    OnboardReminder,
    ReportGeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

// ============================================================================
// Job Model
// ============================================================================

/// How long a claim holds a job in `processing` before another tick may
/// reclaim it. Generous relative to the 10 s tick ceiling, so only a
/// genuinely dead worker's jobs get picked back up.
pub const CLAIM_LEASE_MINUTES: i32 = 10;

/// One unit of scheduled outbound work.
///
/// `scheduled_for` is an absolute UTC instant with jitter already baked in.
/// Recurring jobs (`recurrence = "daily"`) keep `local_time` + `timezone` so
/// the next occurrence is recomputed from the wall clock, never from a
/// cached UTC offset. `lease_expires_at` is set while the job is
/// `processing`; a claim whose worker died past the lease is recovered by a
/// later tick.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub scheduled_for: DateTime<Utc>,
    pub payload: Option<serde_json::Value>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub recurrence: Option<String>,
    pub local_time: Option<NaiveTime>,
    pub timezone: String,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// Build a one-shot job record (not yet inserted)
    pub fn one_shot(
        patient_id: Uuid,
        job_type: JobType,
        scheduled_for: DateTime<Utc>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            job_type,
            status: JobStatus::Pending,
            scheduled_for,
            payload,
            attempts: 0,
            max_attempts: 3,
            last_error: None,
            recurrence: None,
            local_time: None,
            timezone: "UTC".to_string(),
            lease_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Build a daily-recurring job record (not yet inserted)
    pub fn daily(
        patient_id: Uuid,
        job_type: JobType,
        scheduled_for: DateTime<Utc>,
        local_time: NaiveTime,
        timezone: &str,
    ) -> Self {
        Self {
            recurrence: Some("daily".to_string()),
            local_time: Some(local_time),
            timezone: timezone.to_string(),
            ..Self::one_shot(patient_id, job_type, scheduled_for, None)
        }
    }

    /// Whether this job recurs daily
    pub fn is_recurring(&self) -> bool {
        self.recurrence.as_deref() == Some("daily")
    }

    /// Whether the job would be picked up by a claim at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_for <= now
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>("SELECT * FROM scheduled_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Find all pending jobs for a patient of a given type
    pub async fn find_pending(
        patient_id: Uuid,
        job_type: JobType,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM scheduled_jobs
             WHERE patient_id = $1 AND job_type = $2 AND status = 'pending'
             ORDER BY scheduled_for ASC",
        )
        .bind(patient_id)
        .bind(job_type)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO scheduled_jobs (
                id, patient_id, job_type, status, scheduled_for, payload,
                attempts, max_attempts, last_error, recurrence, local_time, timezone
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(self.id)
        .bind(self.patient_id)
        .bind(self.job_type)
        .bind(self.status)
        .bind(self.scheduled_for)
        .bind(&self.payload)
        .bind(self.attempts)
        .bind(self.max_attempts)
        .bind(&self.last_error)
        .bind(&self.recurrence)
        .bind(self.local_time)
        .bind(&self.timezone)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Atomically claim up to `limit` due jobs using FOR UPDATE SKIP LOCKED.
    ///
    /// Rows already locked by a concurrent claimer are skipped, never waited
    /// on, so two overlapping ticks can never claim the same job. Claimed
    /// rows flip to `processing` with a fresh lease in the same statement.
    /// Jobs stranded in `processing` by a worker that died past its lease
    /// are recovered by the same claim.
    pub async fn claim_due(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            WITH due AS (
                SELECT id
                FROM scheduled_jobs
                WHERE (status = 'pending' AND scheduled_for <= NOW())
                   OR (status = 'processing' AND lease_expires_at < NOW())
                ORDER BY scheduled_for ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE scheduled_jobs
            SET status = 'processing',
                lease_expires_at = NOW() + make_interval(mins => $2),
                updated_at = NOW()
            WHERE id IN (SELECT id FROM due)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(CLAIM_LEASE_MINUTES)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
