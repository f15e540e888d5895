use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// How a daily entry's level was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "response_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseMethod {
    Numeric,
    AiParsed,
    RegexFallback,
    Clarified,
}

/// One row per (patient, sprint, date) - the unit of engagement data.
///
/// Immutable once written except for at-most-one correcting update on the
/// same date; the upsert is keyed on (patient_id, sprint_id, entry_date).
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct DailyEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub sprint_id: Uuid,
    pub entry_date: NaiveDate,
    pub level: i32,
    pub response_method: ResponseMethod,
    pub confidence: f64,
    pub response_latency_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyEntry {
    /// Idempotent upsert: re-running for the same (patient, sprint, date)
    /// overwrites the prior value and never creates a duplicate row.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        patient_id: Uuid,
        sprint_id: Uuid,
        entry_date: NaiveDate,
        level: i32,
        response_method: ResponseMethod,
        confidence: f64,
        response_latency_seconds: Option<i64>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO daily_entries (
                patient_id, sprint_id, entry_date, level,
                response_method, confidence, response_latency_seconds
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (patient_id, sprint_id, entry_date) DO UPDATE SET
                level = EXCLUDED.level,
                response_method = EXCLUDED.response_method,
                confidence = EXCLUDED.confidence,
                response_latency_seconds = EXCLUDED.response_latency_seconds,
                updated_at = NOW()
             RETURNING *",
        )
        .bind(patient_id)
        .bind(sprint_id)
        .bind(entry_date)
        .bind(level)
        .bind(response_method)
        .bind(confidence)
        .bind(response_latency_seconds)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_for_date(
        patient_id: Uuid,
        sprint_id: Uuid,
        entry_date: NaiveDate,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM daily_entries
             WHERE patient_id = $1 AND sprint_id = $2 AND entry_date = $3",
        )
        .bind(patient_id)
        .bind(sprint_id)
        .bind(entry_date)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Whether the patient already has an entry for this date (used by the
    /// daily check-in handler to skip prompting someone who replied early).
    pub async fn exists_for_date(
        patient_id: Uuid,
        sprint_id: Uuid,
        entry_date: NaiveDate,
        pool: &PgPool,
    ) -> Result<bool> {
        Ok(Self::find_for_date(patient_id, sprint_id, entry_date, pool)
            .await?
            .is_some())
    }
}
