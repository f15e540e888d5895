use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Lifecycle state of a patient. `Unsubscribed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "patient_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatientState {
    Enrolled,
    Onboarding,
    DailyActive,
    Paused,
    Transition,
    Weekly,
    Treatment,
    Dormant,
    Unsubscribed,
}

/// What inbound reply the conversation is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pending_question", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PendingQuestion {
    DailyCheckin,
    ClarifyLevel,
    WeeklyQuestion,
    TransitionChoice,
}

/// Patient model - SQL persistence layer
///
/// Exactly one row per real-world patient, keyed by phone number. The
/// `state` column is mutated only through `state_machine::transition`;
/// nothing else writes it.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Patient {
    pub id: Uuid,
    pub phone_number: String,
    pub state: PatientState,
    pub day_count: i32,
    pub consecutive_missed: i32,
    pub preferred_time: NaiveTime,
    pub timezone: String,
    pub pending_question: Option<PendingQuestion>,
    /// Level awaiting confirmation while `pending_question = ClarifyLevel`
    pub pending_level: Option<i32>,
    pub opted_in_at: Option<DateTime<Utc>>,
    pub opted_out_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_phone(phone_number: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM patients WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert a new patient in the Enrolled state
    pub async fn insert(
        phone_number: &str,
        preferred_time: NaiveTime,
        timezone: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO patients (phone_number, preferred_time, timezone)
             VALUES ($1, $2, $3)
             RETURNING *",
        )
        .bind(phone_number)
        .bind(preferred_time)
        .bind(timezone)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Update the pending-question marker (and the stashed clarify level)
    /// without touching lifecycle state.
    pub async fn set_pending(
        id: Uuid,
        pending_question: Option<PendingQuestion>,
        pending_level: Option<i32>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE patients
             SET pending_question = $2,
                 pending_level = $3,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(pending_question)
        .bind(pending_level)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Increment the consecutive-missed counter (daily rollover for a
    /// patient who never replied).
    pub async fn increment_missed(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE patients
             SET consecutive_missed = consecutive_missed + 1,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
