use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::PatientState;

/// What caused a state transition, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "trigger_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    InboundSms,
    ScheduledJob,
    System,
}

/// Append-only audit row. Never updated or deleted.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct StateTransition {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub from_state: PatientState,
    pub to_state: PatientState,
    pub trigger_type: TriggerType,
    pub trigger_detail: String,
    pub created_at: DateTime<Utc>,
}

impl StateTransition {
    pub async fn insert(
        patient_id: Uuid,
        from_state: PatientState,
        to_state: PatientState,
        trigger_type: TriggerType,
        trigger_detail: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO state_transitions
                (patient_id, from_state, to_state, trigger_type, trigger_detail)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(patient_id)
        .bind(from_state)
        .bind(to_state)
        .bind(trigger_type)
        .bind(trigger_detail)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Full transition history for a patient, oldest first.
    pub async fn history(patient_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM state_transitions
             WHERE patient_id = $1
             ORDER BY created_at ASC",
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
