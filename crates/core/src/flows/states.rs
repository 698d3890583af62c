use serde::{Deserialize, Serialize};

use crate::chain::{self, ApprovalRole};
use crate::domain::record::{RecordPatch, RecordStatus, WorkflowRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Submit,
    Approve,
    Reject,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Result of a transition: the patch to persist and the record as it will
/// look once the store accepts it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub action: WorkflowAction,
    pub from_status: RecordStatus,
    pub to_status: RecordStatus,
    pub from_step: Option<ApprovalRole>,
    pub to_step: Option<ApprovalRole>,
    pub patch: RecordPatch,
    pub record: WorkflowRecord,
}

impl TransitionOutcome {
    /// True when an approval ended the chain before its last role.
    pub fn short_circuited(&self) -> bool {
        self.action == WorkflowAction::Approve
            && self.to_status == RecordStatus::Approved
            && self.from_step != Some(chain::last())
    }
}
