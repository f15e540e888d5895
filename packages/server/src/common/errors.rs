use thiserror::Error;

use crate::domains::patients::models::PatientState;

/// Error taxonomy for the engagement engine.
///
/// `Transient` failures are recovered locally (regex fallback, retry
/// ladder) and never surfaced to a patient. `AuditWriteFailure` is logged
/// loudly but never rolls back the committed state change.
#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: PatientState,
        to: PatientState,
    },

    #[error("transient dependency failure: {0}")]
    Transient(String),

    #[error("audit write failed: {0}")]
    AuditWriteFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
