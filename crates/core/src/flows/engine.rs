//! Step transition engine
//!
//! Computes the next state of a workflow record for submit, approve and reject.
//! Every transition is pure: it takes the current record and returns a
//! [`TransitionOutcome`] whose patch the caller hands to the record store.

use chrono::{DateTime, Utc};

use crate::approvals::{authorize, ApproverRoster, AuthorizationFailure};
use crate::chain::{self, ApprovalRole};
use crate::domain::employee::{ActingUser, EmployeeId};
use crate::domain::record::{
    PatchConflict, RecordPatch, RecordStatus, Rejection, StepApproval, WorkflowRecord,
};
use crate::errors::WorkflowError;
use crate::flows::states::{TransitionOutcome, WorkflowAction};

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Longest rejection reason accepted, in characters.
    pub max_reason_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_reason_length: 500 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalEngine {
    config: EngineConfig,
}

impl ApprovalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Moves a draft into the chain at its first role.
    ///
    /// Only the submitting employee may do this, and every role the record is
    /// going to visit must have somebody able to act on it.
    pub fn submit(
        &self,
        record: &WorkflowRecord,
        actor: &ActingUser,
        roster: &ApproverRoster,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        if record.status != RecordStatus::Draft {
            return Err(invalid_state(record));
        }

        if actor.employee_id.as_ref() != Some(&record.subject_employee_id) {
            return Err(WorkflowError::Unauthorized {
                record_id: record.id.clone(),
                actor: actor.label().to_string(),
                reason: "only the submitting employee can submit a draft".to_string(),
            });
        }

        let missing = roster.unassigned(&record.required_roles());
        if !missing.is_empty() {
            let roles = missing.iter().map(ApprovalRole::as_str).collect::<Vec<_>>().join(", ");
            return Err(WorkflowError::Validation(format!("no approver assigned for: {roles}")));
        }

        let patch = RecordPatch {
            status: RecordStatus::Submitted,
            current_approval_step: Some(chain::first()),
            step_approval: None,
            rejection: None,
            updated_at: now,
        };
        outcome(WorkflowAction::Submit, record, patch)
    }

    pub fn approve(
        &self,
        record: &WorkflowRecord,
        actor: &ActingUser,
        roster: &ApproverRoster,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let step = in_flight_step(record)?;
        let actor_id = ensure_authorized(record, actor, roster)?;

        let (status, next_step) = if step == ApprovalRole::StaffGa && !record.has_cash_advance() {
            // nothing for finance to reconcile
            (RecordStatus::Approved, None)
        } else if chain::is_last(step) {
            (RecordStatus::Approved, None)
        } else {
            (RecordStatus::Submitted, Some(chain::next(step)))
        };

        let patch = RecordPatch {
            status,
            current_approval_step: next_step,
            step_approval: Some((step, StepApproval { approved_at: now, approved_by: actor_id })),
            rejection: None,
            updated_at: now,
        };
        outcome(WorkflowAction::Approve, record, patch)
    }

    /// Ends the workflow. The current step and earlier approval stamps are
    /// kept so the history stays visible.
    pub fn reject(
        &self,
        record: &WorkflowRecord,
        actor: &ActingUser,
        roster: &ApproverRoster,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        in_flight_step(record)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation("missing reason".to_string()));
        }
        let length = reason.chars().count();
        if length > self.config.max_reason_length {
            return Err(WorkflowError::Validation(format!(
                "reason is {length} characters, the limit is {}",
                self.config.max_reason_length
            )));
        }

        let actor_id = ensure_authorized(record, actor, roster)?;
        let patch = RecordPatch {
            status: RecordStatus::Rejected,
            current_approval_step: record.current_approval_step,
            step_approval: None,
            rejection: Some(Rejection {
                rejected_at: now,
                rejected_by: actor_id,
                reason: reason.to_string(),
            }),
            updated_at: now,
        };
        outcome(WorkflowAction::Reject, record, patch)
    }
}

fn invalid_state(record: &WorkflowRecord) -> WorkflowError {
    WorkflowError::InvalidState {
        record_id: record.id.clone(),
        status: record.status,
        step: record.current_approval_step,
    }
}

fn in_flight_step(record: &WorkflowRecord) -> Result<ApprovalRole, WorkflowError> {
    if record.status != RecordStatus::Submitted {
        return Err(invalid_state(record));
    }
    record.current_approval_step.ok_or_else(|| invalid_state(record))
}

fn ensure_authorized(
    record: &WorkflowRecord,
    actor: &ActingUser,
    roster: &ApproverRoster,
) -> Result<EmployeeId, WorkflowError> {
    let decision = authorize(record, actor, roster);
    match (decision.failure, actor.employee_id.as_ref()) {
        (None, Some(actor_id)) => Ok(actor_id.clone()),
        (Some(AuthorizationFailure::StepAlreadyActioned { .. }), _) => {
            Err(WorkflowError::Conflict { record_id: record.id.clone(), detail: decision.reason })
        }
        (_, _) => Err(WorkflowError::Unauthorized {
            record_id: record.id.clone(),
            actor: actor.label().to_string(),
            reason: decision.reason,
        }),
    }
}

fn outcome(
    action: WorkflowAction,
    record: &WorkflowRecord,
    patch: RecordPatch,
) -> Result<TransitionOutcome, WorkflowError> {
    let mut next = record.clone();
    patch.apply_to(&mut next).map_err(|conflict| conflict_error(record, conflict))?;

    Ok(TransitionOutcome {
        action,
        from_status: record.status,
        to_status: next.status,
        from_step: record.current_approval_step,
        to_step: next.current_approval_step,
        patch,
        record: next,
    })
}

fn conflict_error(record: &WorkflowRecord, conflict: PatchConflict) -> WorkflowError {
    WorkflowError::Conflict { record_id: record.id.clone(), detail: conflict.to_string() }
}
