//! Read-only views over a record's approval stamps, for whoever is looking at
//! the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{self, ApprovalRole};
use crate::domain::employee::EmployeeId;
use crate::domain::record::{RecordId, RecordKind, RecordStatus, Rejection, WorkflowRecord};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestApproval {
    pub role: ApprovalRole,
    pub approved_at: DateTime<Utc>,
    pub approved_by: EmployeeId,
}

/// Steps run strictly in chain order, so the highest stamped role is the most
/// recent one.
pub fn latest_approval(record: &WorkflowRecord) -> Option<LatestApproval> {
    chain::roles().iter().rev().find_map(|role| {
        record.approvals.get(*role).map(|step| LatestApproval {
            role: *role,
            approved_at: step.approved_at,
            approved_by: step.approved_by.clone(),
        })
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StatusLabel {
    pub badge_class: &'static str,
    pub text: &'static str,
}

pub fn status_label(status: RecordStatus) -> StatusLabel {
    let (badge_class, text) = match status {
        RecordStatus::Draft => ("badge-secondary", "Draft"),
        RecordStatus::Submitted => ("badge-warning", "Submitted"),
        RecordStatus::Approved => ("badge-success", "Approved"),
        RecordStatus::Rejected => ("badge-danger", "Rejected"),
        RecordStatus::Completed => ("badge-info", "Completed"),
        RecordStatus::Paid => ("badge-primary", "Paid"),
    };
    StatusLabel { badge_class, text }
}

pub fn is_auto_approved(record: &WorkflowRecord) -> bool {
    record.status == RecordStatus::Approved && record.approvals.is_empty()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepState {
    Approved { approved_at: DateTime<Utc>, approved_by: EmployeeId },
    Current,
    Pending,
    Skipped,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub role: ApprovalRole,
    pub label: &'static str,
    pub state: StepState,
}

pub fn approval_timeline(record: &WorkflowRecord) -> Vec<TimelineEntry> {
    chain::roles()
        .iter()
        .map(|role| {
            let state = match record.approvals.get(*role) {
                Some(step) => StepState::Approved {
                    approved_at: step.approved_at,
                    approved_by: step.approved_by.clone(),
                },
                None => unstamped_state(record, *role),
            };
            TimelineEntry { role: *role, label: role.display_name(), state }
        })
        .collect()
}

fn unstamped_state(record: &WorkflowRecord, role: ApprovalRole) -> StepState {
    let at_step = record.current_approval_step == Some(role);
    match record.status {
        RecordStatus::Rejected if at_step => StepState::Rejected,
        RecordStatus::Submitted if at_step => StepState::Current,
        RecordStatus::Draft | RecordStatus::Submitted | RecordStatus::Rejected => {
            StepState::Pending
        }
        RecordStatus::Approved | RecordStatus::Completed | RecordStatus::Paid => {
            StepState::Skipped
        }
    }
}

/// One-line description of where the record stands.
pub fn approval_summary(record: &WorkflowRecord) -> String {
    match record.status {
        RecordStatus::Draft => "Not submitted yet".to_string(),
        RecordStatus::Rejected => match &record.rejection {
            Some(rejection) => {
                format!("Rejected by {}: {}", rejection.rejected_by.0, rejection.reason)
            }
            None => "Rejected".to_string(),
        },
        RecordStatus::Submitted => match record.current_approval_step {
            Some(step) => format!("Waiting for {} approval", step.display_name()),
            None => "Submitted".to_string(),
        },
        RecordStatus::Approved | RecordStatus::Completed | RecordStatus::Paid => {
            if is_auto_approved(record) {
                return "Auto-approved".to_string();
            }
            match latest_approval(record) {
                Some(latest) => format!("Approved by {}", latest.role.display_name()),
                None => status_label(record.status).text.to_string(),
            }
        }
    }
}

/// Everything a detail page or the CLI shows for one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordView {
    pub id: RecordId,
    pub kind: RecordKind,
    pub number: String,
    pub subject_employee_id: EmployeeId,
    pub status: RecordStatus,
    pub status_label: StatusLabel,
    pub current_approval_step: Option<ApprovalRole>,
    pub latest_approval: Option<LatestApproval>,
    pub auto_approved: bool,
    pub summary: String,
    pub rejection: Option<Rejection>,
    pub timeline: Vec<TimelineEntry>,
    pub version: u64,
}

pub fn record_view(record: &WorkflowRecord) -> RecordView {
    RecordView {
        id: record.id.clone(),
        kind: record.kind,
        number: record.number.clone(),
        subject_employee_id: record.subject_employee_id.clone(),
        status: record.status,
        status_label: status_label(record.status),
        current_approval_step: record.current_approval_step,
        latest_approval: latest_approval(record),
        auto_approved: is_auto_approved(record),
        summary: approval_summary(record),
        rejection: record.rejection.clone(),
        timeline: approval_timeline(record),
        version: record.version,
    }
}
