//! The sole authority for patient lifecycle state.
//!
//! Every read-modify-write of the `state` column goes through
//! [`transition`]; no other code writes it. The legal-transition table is a
//! static directed graph with one override edge: `Unsubscribed` is reachable
//! from every non-terminal state (regulatory "stop immediately") and has no
//! outgoing edges.

use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::common::EngagementError;

use super::models::{Patient, PatientState, PendingQuestion, StateTransition, TriggerType};

/// All lifecycle states, for exhaustive table checks.
pub const ALL_STATES: [PatientState; 9] = [
    PatientState::Enrolled,
    PatientState::Onboarding,
    PatientState::DailyActive,
    PatientState::Paused,
    PatientState::Transition,
    PatientState::Weekly,
    PatientState::Treatment,
    PatientState::Dormant,
    PatientState::Unsubscribed,
];

/// Legal targets for each state, excluding the Unsubscribed override edge.
pub fn allowed_targets(from: PatientState) -> &'static [PatientState] {
    use PatientState::*;
    match from {
        Enrolled => &[Onboarding],
        Onboarding => &[DailyActive, Paused],
        // DailyActive -> DailyActive is the daily recurrence self-loop.
        DailyActive => &[DailyActive, Paused, Transition, Weekly, Dormant],
        Paused => &[DailyActive, Dormant],
        Transition => &[DailyActive, Weekly, Treatment],
        Weekly => &[DailyActive, Treatment, Dormant],
        Treatment => &[DailyActive, Weekly, Dormant],
        Dormant => &[DailyActive, Onboarding],
        Unsubscribed => &[],
    }
}

/// Whether `from -> to` is a legal edge, counting the Unsubscribed override.
pub fn is_allowed(from: PatientState, to: PatientState) -> bool {
    if to == PatientState::Unsubscribed {
        return from != PatientState::Unsubscribed;
    }
    allowed_targets(from).contains(&to)
}

/// Extra column updates applied atomically with a state change.
#[derive(Debug, Default, Clone)]
pub struct TransitionUpdates {
    pub day_count: Option<i32>,
    pub consecutive_missed: Option<i32>,
    /// When true, pending_question/pending_level are overwritten (possibly
    /// to NULL); when false they are left untouched.
    pub set_pending: bool,
    pub pending_question: Option<PendingQuestion>,
    pub pending_level: Option<i32>,
}

impl TransitionUpdates {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_day_count(mut self, day_count: i32) -> Self {
        self.day_count = Some(day_count);
        self
    }

    pub fn with_consecutive_missed(mut self, consecutive_missed: i32) -> Self {
        self.consecutive_missed = Some(consecutive_missed);
        self
    }

    pub fn with_pending(mut self, question: PendingQuestion, level: Option<i32>) -> Self {
        self.set_pending = true;
        self.pending_question = Some(question);
        self.pending_level = level;
        self
    }

    pub fn clear_pending(mut self) -> Self {
        self.set_pending = true;
        self.pending_question = None;
        self.pending_level = None;
        self
    }
}

/// Move a patient to `to`, applying `updates` in the same atomic write.
///
/// Reads the current state fresh under a row lock, so a concurrent
/// transition for the same patient observes the already-updated state
/// rather than clobbering it. Behavior:
///
/// - `NotFound` if the patient does not exist.
/// - Same-state calls are accepted as a no-op (current row returned, no
///   audit write) unless `to == DailyActive`, which is the legitimate daily
///   recurrence and proceeds normally.
/// - `InvalidTransition` if the edge is illegal and `to != Unsubscribed`.
/// - On success, `opted_in_at` is set on first entry into Onboarding and
///   `opted_out_at` on entry into Unsubscribed.
///
/// The audit row is written immediately after commit. If that write fails
/// the state change is NOT rolled back; the failure is logged loudly and
/// left to monitoring, because losing an audit entry is less harmful than
/// losing a live state change mid-conversation.
pub async fn transition(
    patient_id: Uuid,
    to: PatientState,
    trigger_type: TriggerType,
    trigger_detail: &str,
    updates: TransitionUpdates,
    pool: &PgPool,
) -> Result<Patient, EngagementError> {
    let mut tx = pool.begin().await?;

    let current =
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = $1 FOR UPDATE")
            .bind(patient_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(EngagementError::NotFound("patient"))?;

    let from = current.state;

    if from == to && to != PatientState::DailyActive {
        // Same-state no-op: nothing written, no audit row.
        return Ok(current);
    }

    if !is_allowed(from, to) {
        return Err(EngagementError::InvalidTransition { from, to });
    }

    let updated = sqlx::query_as::<_, Patient>(
        "UPDATE patients SET
            state = $2,
            day_count = COALESCE($3, day_count),
            consecutive_missed = COALESCE($4, consecutive_missed),
            pending_question = CASE WHEN $5 THEN $6 ELSE pending_question END,
            pending_level = CASE WHEN $5 THEN $7 ELSE pending_level END,
            opted_in_at = CASE WHEN $8 AND opted_in_at IS NULL THEN NOW() ELSE opted_in_at END,
            opted_out_at = CASE WHEN $9 THEN NOW() ELSE opted_out_at END,
            updated_at = NOW()
         WHERE id = $1 AND state = $10
         RETURNING *",
    )
    .bind(patient_id)
    .bind(to)
    .bind(updates.day_count)
    .bind(updates.consecutive_missed)
    .bind(updates.set_pending)
    .bind(updates.pending_question)
    .bind(updates.pending_level)
    .bind(to == PatientState::Onboarding)
    .bind(to == PatientState::Unsubscribed)
    .bind(from)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        patient_id = %patient_id,
        from = ?from,
        to = ?to,
        trigger = ?trigger_type,
        detail = %trigger_detail,
        "patient state transition"
    );

    if let Err(e) =
        StateTransition::insert(patient_id, from, to, trigger_type, trigger_detail, pool).await
    {
        // Deliberate asymmetry: the committed state change stands. Covered
        // by monitoring, not by compensation.
        let failure = EngagementError::AuditWriteFailure(e.to_string());
        error!(
            patient_id = %patient_id,
            from = ?from,
            to = ?to,
            error = %failure,
            "AUDIT WRITE FAILED: state change committed without audit row"
        );
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PatientState::*;

    #[test]
    fn unsubscribed_is_reachable_from_every_non_terminal_state() {
        for from in ALL_STATES {
            if from != Unsubscribed {
                assert!(is_allowed(from, Unsubscribed), "{:?} -> Unsubscribed", from);
            }
        }
    }

    #[test]
    fn unsubscribed_has_no_outgoing_edges() {
        assert!(allowed_targets(Unsubscribed).is_empty());
        for to in ALL_STATES {
            assert!(!is_allowed(Unsubscribed, to), "Unsubscribed -> {:?}", to);
        }
    }

    #[test]
    fn daily_active_self_loop_is_legal() {
        assert!(is_allowed(DailyActive, DailyActive));
    }

    #[test]
    fn enrolled_can_only_move_to_onboarding_or_unsubscribe() {
        for to in ALL_STATES {
            let expected = matches!(to, Onboarding | Unsubscribed);
            assert_eq!(is_allowed(Enrolled, to), expected, "Enrolled -> {:?}", to);
        }
    }

    #[test]
    fn illegal_edges_are_rejected() {
        assert!(!is_allowed(Enrolled, DailyActive));
        assert!(!is_allowed(Paused, Transition));
        assert!(!is_allowed(Dormant, Weekly));
        assert!(!is_allowed(Treatment, Transition));
    }

    #[test]
    fn dormant_patient_can_reactivate() {
        assert!(is_allowed(Dormant, DailyActive));
        assert!(is_allowed(Dormant, Onboarding));
    }

    #[test]
    fn non_recurrence_self_loops_are_not_table_edges() {
        for state in ALL_STATES {
            if state != DailyActive {
                assert!(
                    !allowed_targets(state).contains(&state),
                    "{:?} self-loop should not be a table edge",
                    state
                );
            }
        }
    }

    #[test]
    fn updates_builder_sets_pending_fields() {
        let updates = TransitionUpdates::none().with_pending(PendingQuestion::ClarifyLevel, Some(3));
        assert!(updates.set_pending);
        assert_eq!(updates.pending_question, Some(PendingQuestion::ClarifyLevel));
        assert_eq!(updates.pending_level, Some(3));
    }

    #[test]
    fn updates_builder_clear_overwrites_to_null() {
        let updates = TransitionUpdates::none().clear_pending();
        assert!(updates.set_pending);
        assert!(updates.pending_question.is_none());
        assert!(updates.pending_level.is_none());
    }
}
