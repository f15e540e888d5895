use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sprint_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    Active,
    Completed,
    Abandoned,
}

/// A bounded tracking period owned by exactly one patient.
///
/// At most one sprint per patient is Active at a time (enforced by a
/// partial unique index); new sprints are created on (re)activation.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Sprint {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: SprintStatus,
    pub target_days: i32,
    pub days_completed: i32,
    pub days_missed: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sprint {
    pub async fn find_active(patient_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM sprints WHERE patient_id = $1 AND status = 'active'",
        )
        .bind(patient_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Start a fresh sprint, abandoning any sprint still marked active.
    pub async fn start_new(patient_id: Uuid, target_days: i32, pool: &PgPool) -> Result<Self> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE sprints
             SET status = 'abandoned', ended_at = NOW(), updated_at = NOW()
             WHERE patient_id = $1 AND status = 'active'",
        )
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        let sprint = sqlx::query_as::<_, Self>(
            "INSERT INTO sprints (patient_id, target_days)
             VALUES ($1, $2)
             RETURNING *",
        )
        .bind(patient_id)
        .bind(target_days)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(sprint)
    }

    pub async fn increment_completed(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE sprints
             SET days_completed = days_completed + 1, updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn increment_missed(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE sprints
             SET days_missed = days_missed + 1, updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_completed(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE sprints
             SET status = 'completed', ended_at = NOW(), updated_at = NOW()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
