use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{self, ApprovalRole};
use crate::domain::employee::{EmployeeId, OrgUnitId};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    BusinessTrip,
    ExpenseClaim,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessTrip => "business_trip",
            Self::ExpenseClaim => "expense_claim",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "business_trip" => Some(Self::BusinessTrip),
            "expense_claim" => Some(Self::ExpenseClaim),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Completed,
    Paid,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Completed | Self::Paid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepApproval {
    pub approved_at: DateTime<Utc>,
    pub approved_by: EmployeeId,
}

/// Per-role approval stamps. A role is stamped at most once and never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTrail {
    steps: BTreeMap<ApprovalRole, StepApproval>,
}

impl ApprovalTrail {
    pub fn get(&self, role: ApprovalRole) -> Option<&StepApproval> {
        self.steps.get(&role)
    }

    pub fn approved_by(&self, role: ApprovalRole) -> Option<&EmployeeId> {
        self.get(role).map(|step| &step.approved_by)
    }

    pub fn approved_at(&self, role: ApprovalRole) -> Option<DateTime<Utc>> {
        self.get(role).map(|step| step.approved_at)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Stamps in chain order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (ApprovalRole, &StepApproval)> {
        self.steps.iter().map(|(role, step)| (*role, step))
    }

    pub fn stamp(&mut self, role: ApprovalRole, step: StepApproval) -> Result<(), PatchConflict> {
        if self.steps.contains_key(&role) {
            return Err(PatchConflict::StepAlreadyApproved { role });
        }
        self.steps.insert(role, step);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub rejected_at: DateTime<Utc>,
    pub rejected_by: EmployeeId,
    pub reason: String,
}

/// A business trip or an expense claim moving through the approval chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: RecordId,
    pub kind: RecordKind,
    pub number: String,
    pub subject_employee_id: EmployeeId,
    pub org_unit_id: OrgUnitId,
    pub status: RecordStatus,
    pub current_approval_step: Option<ApprovalRole>,
    pub approvals: ApprovalTrail,
    pub rejection: Option<Rejection>,
    /// Advance paid out before the trip. Nothing to reconcile when absent or
    /// not positive, which lets the chain stop after Staff GA.
    pub cash_advance: Option<Decimal>,
    /// Bumped by the store on every accepted update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewWorkflowRecord {
    pub id: RecordId,
    pub kind: RecordKind,
    pub number: String,
    pub subject_employee_id: EmployeeId,
    pub org_unit_id: OrgUnitId,
    pub cash_advance: Option<Decimal>,
}

impl WorkflowRecord {
    pub fn draft(input: NewWorkflowRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: input.id,
            kind: input.kind,
            number: input.number,
            subject_employee_id: input.subject_employee_id,
            org_unit_id: input.org_unit_id,
            status: RecordStatus::Draft,
            current_approval_step: None,
            approvals: ApprovalTrail::default(),
            rejection: None,
            cash_advance: input.cash_advance,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_cash_advance(&self) -> bool {
        self.cash_advance.map(|amount| amount > Decimal::ZERO).unwrap_or(false)
    }

    /// Roles this record will visit if nobody rejects it.
    pub fn required_roles(&self) -> Vec<ApprovalRole> {
        if self.has_cash_advance() {
            chain::roles().to_vec()
        } else {
            chain::roles()
                .iter()
                .copied()
                .take_while(|role| *role <= ApprovalRole::StaffGa)
                .collect()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PatchConflict {
    #[error("step `{role}` was already approved")]
    StepAlreadyApproved { role: ApprovalRole },
    #[error("record was already rejected")]
    AlreadyRejected,
}

/// The partial update a transition asks the store to apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub status: RecordStatus,
    pub current_approval_step: Option<ApprovalRole>,
    pub step_approval: Option<(ApprovalRole, StepApproval)>,
    pub rejection: Option<Rejection>,
    pub updated_at: DateTime<Utc>,
}

impl RecordPatch {
    pub fn apply_to(&self, record: &mut WorkflowRecord) -> Result<(), PatchConflict> {
        if let Some((role, step)) = &self.step_approval {
            record.approvals.stamp(*role, step.clone())?;
        }
        if let Some(rejection) = &self.rejection {
            if record.rejection.is_some() {
                return Err(PatchConflict::AlreadyRejected);
            }
            record.rejection = Some(rejection.clone());
        }
        record.status = self.status;
        record.current_approval_step = self.current_approval_step;
        record.updated_at = self.updated_at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::chain::ApprovalRole;
    use crate::domain::employee::{EmployeeId, OrgUnitId};

    use super::{
        NewWorkflowRecord, PatchConflict, RecordId, RecordKind, RecordPatch, RecordStatus,
        StepApproval, WorkflowRecord,
    };

    fn trip(cash_advance: Option<Decimal>) -> WorkflowRecord {
        WorkflowRecord::draft(
            NewWorkflowRecord {
                id: RecordId("BT-1".to_string()),
                kind: RecordKind::BusinessTrip,
                number: "BT/2026/001".to_string(),
                subject_employee_id: EmployeeId("E-1".to_string()),
                org_unit_id: OrgUnitId("acme".to_string()),
                cash_advance,
            },
            Utc::now(),
        )
    }

    #[test]
    fn terminal_statuses() {
        assert!(!RecordStatus::Draft.is_terminal());
        assert!(!RecordStatus::Submitted.is_terminal());
        assert!(RecordStatus::Approved.is_terminal());
        assert!(RecordStatus::Rejected.is_terminal());
        assert!(RecordStatus::Completed.is_terminal());
        assert!(RecordStatus::Paid.is_terminal());
    }

    #[test]
    fn zero_or_missing_cash_advance_stops_after_staff_ga() {
        assert_eq!(
            trip(None).required_roles(),
            vec![ApprovalRole::Supervisor, ApprovalRole::StaffGa]
        );
        assert!(!trip(Some(Decimal::ZERO)).has_cash_advance());
        assert!(!trip(Some(Decimal::new(-5, 0))).has_cash_advance());
        assert_eq!(trip(Some(Decimal::new(500_000, 0))).required_roles().len(), 6);
    }

    #[test]
    fn patch_refuses_to_restamp_a_step() {
        let mut record = trip(None);
        let now = Utc::now();
        let patch = RecordPatch {
            status: RecordStatus::Submitted,
            current_approval_step: Some(ApprovalRole::StaffGa),
            step_approval: Some((
                ApprovalRole::Supervisor,
                StepApproval { approved_at: now, approved_by: EmployeeId("E-2".to_string()) },
            )),
            rejection: None,
            updated_at: now,
        };

        patch.apply_to(&mut record).expect("first stamp applies");
        let error = patch.apply_to(&mut record).expect_err("second stamp must conflict");

        assert_eq!(error, PatchConflict::StepAlreadyApproved { role: ApprovalRole::Supervisor });
        assert_eq!(
            record.approvals.approved_by(ApprovalRole::Supervisor),
            Some(&EmployeeId("E-2".to_string()))
        );
    }

    #[test]
    fn status_keys_round_trip() {
        for status in [
            RecordStatus::Draft,
            RecordStatus::Submitted,
            RecordStatus::Approved,
            RecordStatus::Rejected,
            RecordStatus::Completed,
            RecordStatus::Paid,
        ] {
            assert_eq!(RecordStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RecordKind::parse("expense_claim"), Some(RecordKind::ExpenseClaim));
    }
}
