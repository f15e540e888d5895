//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly. Lifecycle state is set
//! with a raw update because tests need patients parked in arbitrary states
//! without walking the full transition graph to get there.

use anyhow::Result;
use chrono::{Duration, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use server_core::domains::patients::{Patient, PatientState};
use server_core::domains::sprints::Sprint;
use server_core::kernel::jobs::{JobType, ScheduledJob};

/// A unique E.164 number per call, so tests sharing the database never
/// collide on the phone key.
pub fn unique_phone() -> String {
    let digits = Uuid::new_v4().as_u128() % 10_000_000;
    format!("+1612{:07}", digits)
}

/// Create a patient parked in the given lifecycle state.
pub async fn create_patient_in_state(pool: &PgPool, state: PatientState) -> Result<Patient> {
    let patient = Patient::insert(
        &unique_phone(),
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        "America/Chicago",
        pool,
    )
    .await?;

    sqlx::query_as::<_, Patient>(
        "UPDATE patients SET state = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(patient.id)
    .bind(state)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Overwrite a patient's day counter directly.
pub async fn set_day_count(pool: &PgPool, patient_id: Uuid, day_count: i32) -> Result<Patient> {
    sqlx::query_as::<_, Patient>(
        "UPDATE patients SET day_count = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(patient_id)
    .bind(day_count)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Open an active tracking sprint for a patient.
pub async fn create_active_sprint(pool: &PgPool, patient_id: Uuid) -> Result<Sprint> {
    Sprint::start_new(patient_id, 30, pool).await
}

/// Insert a one-shot job already past due, ready for the next claim.
pub async fn create_due_job(
    pool: &PgPool,
    patient_id: Uuid,
    job_type: JobType,
) -> Result<ScheduledJob> {
    ScheduledJob::one_shot(
        patient_id,
        job_type,
        Utc::now() - Duration::minutes(5),
        None,
    )
    .insert(pool)
    .await
}
