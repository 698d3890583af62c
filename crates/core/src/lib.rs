pub mod approvals;
pub mod audit;
pub mod chain;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod history;
pub mod service;
pub mod store;

pub use approvals::{
    authorize, can_act, ApproverRoster, AuthorizationDecision, AuthorizationFailure,
};
pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink,
    TracingAuditSink,
};
pub use chain::{ApprovalRole, APPROVAL_CHAIN};
pub use domain::employee::{ActingUser, Employee, EmployeeId, OrgUnitId, RoleAssignment};
pub use domain::record::{
    NewWorkflowRecord, RecordId, RecordKind, RecordPatch, RecordStatus, WorkflowRecord,
};
pub use errors::{ApplicationError, InterfaceError, WorkflowError};
pub use flows::{ApprovalEngine, EngineConfig, TransitionOutcome, WorkflowAction};
pub use history::{
    approval_summary, approval_timeline, is_auto_approved, latest_approval, record_view,
    status_label, RecordView,
};
pub use service::WorkflowService;
pub use store::{DirectoryStore, RecordFilter, StoreError, WorkflowRecordStore};
