//! Decides whether an acting user may approve or reject a record at its
//! current step.

use serde::{Deserialize, Serialize};

use crate::chain::ApprovalRole;
use crate::domain::employee::{ActingUser, EmployeeId, RoleAssignment};
use crate::domain::record::WorkflowRecord;

/// Resolved approvers for one record: the subject's own supervisor plus the
/// role table of the record's organizational unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverRoster {
    pub supervisor_id: Option<EmployeeId>,
    pub assignment: RoleAssignment,
}

impl ApproverRoster {
    pub fn new(supervisor_id: Option<EmployeeId>, assignment: RoleAssignment) -> Self {
        Self { supervisor_id, assignment }
    }

    pub fn holder(&self, role: ApprovalRole) -> Option<&EmployeeId> {
        if role.is_per_employee() {
            self.supervisor_id.as_ref()
        } else {
            self.assignment.assignee(role)
        }
    }

    /// Roles among `roles` nobody could ever act on.
    pub fn unassigned(&self, roles: &[ApprovalRole]) -> Vec<ApprovalRole> {
        roles.iter().copied().filter(|role| self.holder(*role).is_none()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorizationFailure {
    NoCurrentStep,
    StepAlreadyActioned { step: ApprovalRole, approved_by: EmployeeId },
    NoLinkedEmployee { user_id: String },
    NotSupervisor { actor: EmployeeId },
    RoleUnassigned { step: ApprovalRole },
    NotAssignee { step: ApprovalRole, actor: EmployeeId },
}

impl AuthorizationFailure {
    fn reason(&self) -> String {
        match self {
            Self::NoCurrentStep => "record has no current approval step".to_string(),
            Self::StepAlreadyActioned { step, approved_by } => {
                format!("step `{step}` was already approved by `{}`", approved_by.0)
            }
            Self::NoLinkedEmployee { user_id } => {
                format!("user `{user_id}` is not linked to an employee")
            }
            Self::NotSupervisor { actor } => {
                format!("`{}` is not the supervisor of the submitting employee", actor.0)
            }
            Self::RoleUnassigned { step } => {
                format!("no one is assigned to `{step}` for this organizational unit")
            }
            Self::NotAssignee { step, actor } => {
                format!("`{}` is not the assigned `{step}`", actor.0)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: String,
    pub failure: Option<AuthorizationFailure>,
}

impl AuthorizationDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into(), failure: None }
    }

    fn deny(failure: AuthorizationFailure) -> Self {
        Self { allowed: false, reason: failure.reason(), failure: Some(failure) }
    }
}

/// Absence of permission is a denied decision, never an error.
pub fn authorize(
    record: &WorkflowRecord,
    actor: &ActingUser,
    roster: &ApproverRoster,
) -> AuthorizationDecision {
    let Some(step) = record.current_approval_step else {
        return AuthorizationDecision::deny(AuthorizationFailure::NoCurrentStep);
    };

    if let Some(approved_by) = record.approvals.approved_by(step) {
        return AuthorizationDecision::deny(AuthorizationFailure::StepAlreadyActioned {
            step,
            approved_by: approved_by.clone(),
        });
    }

    let Some(actor_id) = actor.employee_id.as_ref() else {
        return AuthorizationDecision::deny(AuthorizationFailure::NoLinkedEmployee {
            user_id: actor.user_id.clone(),
        });
    };

    if step.is_per_employee() {
        return if roster.supervisor_id.as_ref() == Some(actor_id) {
            AuthorizationDecision::allow(format!("`{}` supervises the submitter", actor_id.0))
        } else {
            AuthorizationDecision::deny(AuthorizationFailure::NotSupervisor {
                actor: actor_id.clone(),
            })
        };
    }

    match roster.assignment.assignee(step) {
        None => AuthorizationDecision::deny(AuthorizationFailure::RoleUnassigned { step }),
        Some(assignee) if assignee == actor_id => {
            AuthorizationDecision::allow(format!("`{}` holds `{step}`", actor_id.0))
        }
        Some(_) => AuthorizationDecision::deny(AuthorizationFailure::NotAssignee {
            step,
            actor: actor_id.clone(),
        }),
    }
}

pub fn can_act(record: &WorkflowRecord, actor: &ActingUser, roster: &ApproverRoster) -> bool {
    authorize(record, actor, roster).allowed
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::chain::ApprovalRole;
    use crate::domain::employee::{ActingUser, EmployeeId, OrgUnitId, RoleAssignment};
    use crate::domain::record::{
        NewWorkflowRecord, RecordId, RecordKind, RecordStatus, StepApproval, WorkflowRecord,
    };

    use super::{authorize, can_act, ApproverRoster, AuthorizationFailure};

    fn id(value: &str) -> EmployeeId {
        EmployeeId(value.to_string())
    }

    fn record_at(step: Option<ApprovalRole>) -> WorkflowRecord {
        let mut record = WorkflowRecord::draft(
            NewWorkflowRecord {
                id: RecordId("BT-7".to_string()),
                kind: RecordKind::BusinessTrip,
                number: "BT/2026/007".to_string(),
                subject_employee_id: id("E-1"),
                org_unit_id: OrgUnitId("acme".to_string()),
                cash_advance: None,
            },
            Utc::now(),
        );
        record.status = RecordStatus::Submitted;
        record.current_approval_step = step;
        record
    }

    fn roster() -> ApproverRoster {
        ApproverRoster::new(
            Some(id("E-SUP")),
            RoleAssignment::new(OrgUnitId("acme".to_string()))
                .with(ApprovalRole::StaffGa, id("E-GA"))
                .with(ApprovalRole::SpvGa, id("E-SPV"))
                .with(ApprovalRole::HrManager, id("E-HR"))
                .with(ApprovalRole::Bod, id("E-BOD"))
                .with(ApprovalRole::StaffFa, id("E-FA")),
        )
    }

    #[test]
    fn supervisor_step_accepts_only_the_subjects_supervisor() {
        let record = record_at(Some(ApprovalRole::Supervisor));
        let roster = roster();

        assert!(can_act(&record, &ActingUser::employee("u-sup", "E-SUP"), &roster));
        for other in ["E-GA", "E-SPV", "E-HR", "E-BOD", "E-FA", "E-1"] {
            assert!(
                !can_act(&record, &ActingUser::employee("u", other), &roster),
                "{other} must not act at the supervisor step"
            );
        }
    }

    #[test]
    fn assigned_step_accepts_only_the_assignee() {
        let record = record_at(Some(ApprovalRole::HrManager));
        let roster = roster();

        assert!(can_act(&record, &ActingUser::employee("u-hr", "E-HR"), &roster));
        let decision = authorize(&record, &ActingUser::employee("u-sup", "E-SUP"), &roster);
        assert!(!decision.allowed);
        assert_eq!(
            decision.failure,
            Some(AuthorizationFailure::NotAssignee {
                step: ApprovalRole::HrManager,
                actor: id("E-SUP")
            })
        );
    }

    #[test]
    fn unassigned_role_is_never_actionable() {
        let record = record_at(Some(ApprovalRole::HrManager));
        let roster = ApproverRoster::new(
            Some(id("E-SUP")),
            RoleAssignment::new(OrgUnitId("acme".to_string()))
                .with(ApprovalRole::StaffGa, id("E-GA")),
        );

        let decision = authorize(&record, &ActingUser::employee("u-hr", "E-HR"), &roster);
        assert_eq!(
            decision.failure,
            Some(AuthorizationFailure::RoleUnassigned { step: ApprovalRole::HrManager })
        );
    }

    #[test]
    fn missing_step_or_existing_stamp_denies() {
        let roster = roster();
        let actor = ActingUser::employee("u-ga", "E-GA");

        let no_step = record_at(None);
        assert_eq!(
            authorize(&no_step, &actor, &roster).failure,
            Some(AuthorizationFailure::NoCurrentStep)
        );

        let mut stamped = record_at(Some(ApprovalRole::StaffGa));
        stamped
            .approvals
            .stamp(
                ApprovalRole::StaffGa,
                StepApproval { approved_at: Utc::now(), approved_by: id("E-GA") },
            )
            .expect("stamp");
        assert!(!can_act(&stamped, &actor, &roster));
    }

    #[test]
    fn unlinked_user_cannot_act() {
        let record = record_at(Some(ApprovalRole::StaffGa));
        let decision = authorize(&record, &ActingUser::unlinked("admin"), &roster());

        assert!(matches!(decision.failure, Some(AuthorizationFailure::NoLinkedEmployee { .. })));
        assert!(decision.reason.contains("admin"));
    }

    #[test]
    fn roster_reports_unassigned_roles() {
        let roster = ApproverRoster::new(
            None,
            RoleAssignment::new(OrgUnitId("acme".to_string()))
                .with(ApprovalRole::StaffGa, id("E-GA")),
        );

        assert_eq!(
            roster.unassigned(&[ApprovalRole::Supervisor, ApprovalRole::StaffGa, ApprovalRole::Bod]),
            vec![ApprovalRole::Supervisor, ApprovalRole::Bod]
        );
    }
}
