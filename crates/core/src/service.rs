//! Workflow service
//!
//! Runs one approval action end to end: load the record, resolve who may act
//! on it, let the engine compute the transition, then persist it with a
//! compare-and-update against the version that was read. A lost race surfaces
//! as a `Conflict`; nothing is retried.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::approvals::{authorize, ApproverRoster, AuthorizationDecision};
use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use crate::chain::ApprovalRole;
use crate::domain::employee::{ActingUser, OrgUnitId, RoleAssignment};
use crate::domain::record::{NewWorkflowRecord, RecordId, RecordStatus, WorkflowRecord};
use crate::errors::{ApplicationError, WorkflowError};
use crate::flows::engine::ApprovalEngine;
use crate::flows::states::{TransitionOutcome, WorkflowAction};
use crate::store::{DirectoryStore, RecordFilter, WorkflowRecordStore};

pub struct WorkflowService<S, D, A = NoopAuditSink> {
    store: S,
    directory: D,
    audit: A,
    engine: ApprovalEngine,
}

impl<S, D> WorkflowService<S, D, NoopAuditSink>
where
    S: WorkflowRecordStore,
    D: DirectoryStore,
{
    pub fn new(store: S, directory: D) -> Self {
        Self::with_audit(store, directory, NoopAuditSink, ApprovalEngine::default())
    }
}

impl<S, D, A> WorkflowService<S, D, A>
where
    S: WorkflowRecordStore,
    D: DirectoryStore,
    A: AuditSink,
{
    pub fn with_audit(store: S, directory: D, audit: A, engine: ApprovalEngine) -> Self {
        Self { store, directory, audit, engine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub async fn create_draft(
        &self,
        input: NewWorkflowRecord,
    ) -> Result<WorkflowRecord, ApplicationError> {
        let record = WorkflowRecord::draft(input, Utc::now());
        self.store.insert(record.clone()).await?;
        info!(
            event_name = "workflow.draft.created",
            record_id = %record.id,
            kind = record.kind.as_str(),
            "workflow draft created"
        );
        Ok(record)
    }

    pub async fn get(&self, id: &RecordId) -> Result<WorkflowRecord, ApplicationError> {
        Ok(self.store.get(id).await?)
    }

    /// Subject's supervisor plus the role table of the record's unit. A unit
    /// with no table yields an empty assignment, so only the supervisor step
    /// can ever be acted on.
    pub async fn roster_for(
        &self,
        record: &WorkflowRecord,
    ) -> Result<ApproverRoster, ApplicationError> {
        let subject = self.directory.find_employee(&record.subject_employee_id).await?;
        let assignment = self.assignment_for(&record.org_unit_id).await?;
        Ok(ApproverRoster::new(subject.and_then(|employee| employee.supervisor_id), assignment))
    }

    async fn assignment_for(
        &self,
        org_unit_id: &OrgUnitId,
    ) -> Result<RoleAssignment, ApplicationError> {
        Ok(self
            .directory
            .role_assignment(org_unit_id)
            .await?
            .unwrap_or_else(|| RoleAssignment::new(org_unit_id.clone())))
    }

    pub async fn authorize(
        &self,
        id: &RecordId,
        actor: &ActingUser,
    ) -> Result<AuthorizationDecision, ApplicationError> {
        let record = self.store.get(id).await?;
        let roster = self.roster_for(&record).await?;
        Ok(authorize(&record, actor, &roster))
    }

    pub async fn can_act(
        &self,
        id: &RecordId,
        actor: &ActingUser,
    ) -> Result<bool, ApplicationError> {
        Ok(self.authorize(id, actor).await?.allowed)
    }

    pub async fn submit(
        &self,
        id: &RecordId,
        actor: &ActingUser,
        correlation_id: &str,
    ) -> Result<WorkflowRecord, ApplicationError> {
        self.execute(
            WorkflowAction::Submit,
            id,
            actor,
            None,
            correlation_id,
            |engine, record, roster, now| engine.submit(record, actor, roster, now),
        )
        .await
    }

    /// Approves `expected_step`, the step the actor was looking at. If the
    /// record has moved on since, the click is stale and fails with `Conflict`.
    pub async fn approve(
        &self,
        id: &RecordId,
        actor: &ActingUser,
        expected_step: ApprovalRole,
        correlation_id: &str,
    ) -> Result<WorkflowRecord, ApplicationError> {
        self.execute(
            WorkflowAction::Approve,
            id,
            actor,
            Some(expected_step),
            correlation_id,
            |engine, record, roster, now| engine.approve(record, actor, roster, now),
        )
        .await
    }

    pub async fn reject(
        &self,
        id: &RecordId,
        actor: &ActingUser,
        expected_step: ApprovalRole,
        reason: &str,
        correlation_id: &str,
    ) -> Result<WorkflowRecord, ApplicationError> {
        self.execute(
            WorkflowAction::Reject,
            id,
            actor,
            Some(expected_step),
            correlation_id,
            |engine, record, roster, now| engine.reject(record, actor, roster, reason, now),
        )
        .await
    }

    /// Submitted records `actor` can act on right now.
    pub async fn pending_for(
        &self,
        actor: &ActingUser,
        limit: usize,
    ) -> Result<Vec<WorkflowRecord>, ApplicationError> {
        let submitted =
            self.store.list_by_filter(&RecordFilter::with_status(RecordStatus::Submitted)).await?;

        let mut assignments: HashMap<OrgUnitId, RoleAssignment> = HashMap::new();
        let mut pending = Vec::new();
        for record in submitted {
            if pending.len() >= limit {
                break;
            }
            if !assignments.contains_key(&record.org_unit_id) {
                let assignment = self.assignment_for(&record.org_unit_id).await?;
                assignments.insert(record.org_unit_id.clone(), assignment);
            }
            let subject = self.directory.find_employee(&record.subject_employee_id).await?;
            let roster = ApproverRoster::new(
                subject.and_then(|employee| employee.supervisor_id),
                assignments.get(&record.org_unit_id).cloned().unwrap_or_default(),
            );
            if authorize(&record, actor, &roster).allowed {
                pending.push(record);
            }
        }
        Ok(pending)
    }

    pub async fn history(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<WorkflowRecord>, ApplicationError> {
        Ok(self.store.list_by_filter(filter).await?)
    }

    async fn execute<F>(
        &self,
        action: WorkflowAction,
        id: &RecordId,
        actor: &ActingUser,
        expected_step: Option<ApprovalRole>,
        correlation_id: &str,
        transition: F,
    ) -> Result<WorkflowRecord, ApplicationError>
    where
        F: FnOnce(
            &ApprovalEngine,
            &WorkflowRecord,
            &ApproverRoster,
            DateTime<Utc>,
        ) -> Result<TransitionOutcome, WorkflowError>,
    {
        let record = self.store.get(id).await?;
        let roster = self.roster_for(&record).await?;

        let checked = match expected_step {
            Some(expected) => ensure_step_unchanged(&record, expected),
            None => Ok(()),
        };
        if let Err(error) = checked {
            let error = ApplicationError::from(error);
            self.report_failure(action, &record, actor, correlation_id, &error);
            return Err(error);
        }

        let outcome = match transition(&self.engine, &record, &roster, Utc::now()) {
            Ok(outcome) => outcome,
            Err(error) => {
                let error = ApplicationError::from(error);
                self.report_failure(action, &record, actor, correlation_id, &error);
                return Err(error);
            }
        };

        match self.store.compare_and_update(id, record.version, &outcome.patch).await {
            Ok(updated) => {
                let event_name = format!("workflow.{}.applied", action.as_str());
                info!(
                    event_name = event_name.as_str(),
                    record_id = %id,
                    actor = actor.label(),
                    step = ?outcome.from_step,
                    to_step = ?outcome.to_step,
                    status = updated.status.as_str(),
                    correlation_id,
                    "workflow transition applied"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(id.clone()),
                        correlation_id,
                        format!("workflow.{}", action.as_str()),
                        AuditCategory::Workflow,
                        actor.label(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from_status", outcome.from_status.as_str())
                    .with_metadata("to_status", updated.status.as_str())
                    .with_metadata("from_step", step_key(outcome.from_step))
                    .with_metadata("to_step", step_key(outcome.to_step))
                    .with_metadata("version", updated.version.to_string()),
                );
                Ok(updated)
            }
            Err(error) => {
                let error = ApplicationError::from(error);
                self.report_failure(action, &record, actor, correlation_id, &error);
                Err(error)
            }
        }
    }

    fn report_failure(
        &self,
        action: WorkflowAction,
        record: &WorkflowRecord,
        actor: &ActingUser,
        correlation_id: &str,
        error: &ApplicationError,
    ) {
        let event_name = format!("workflow.{}.{}", action.as_str(), error.class());
        warn!(
            event_name = event_name.as_str(),
            record_id = %record.id,
            actor = actor.label(),
            step = ?record.current_approval_step,
            correlation_id,
            error = %error,
            "workflow transition refused"
        );

        let (category, outcome) = match error {
            ApplicationError::Workflow(WorkflowError::Unauthorized { .. }) => {
                (AuditCategory::Authorization, AuditOutcome::Rejected)
            }
            ApplicationError::Workflow(_) => (AuditCategory::Workflow, AuditOutcome::Rejected),
            ApplicationError::Persistence(_) | ApplicationError::Configuration(_) => {
                (AuditCategory::Persistence, AuditOutcome::Failed)
            }
        };
        self.audit.emit(
            AuditEvent::new(
                Some(record.id.clone()),
                correlation_id,
                format!("workflow.{}", action.as_str()),
                category,
                actor.label(),
                outcome,
            )
            .with_metadata("error_class", error.class())
            .with_metadata("error", error.to_string()),
        );
    }
}

/// A submitted record sitting at another step than the one the actor acted on
/// was moved by an earlier action. Terminal records fall through to the
/// engine, which reports them as `InvalidState`.
fn ensure_step_unchanged(
    record: &WorkflowRecord,
    expected: ApprovalRole,
) -> Result<(), WorkflowError> {
    if record.status != RecordStatus::Submitted
        || record.current_approval_step == Some(expected)
    {
        return Ok(());
    }
    Err(WorkflowError::Conflict {
        record_id: record.id.clone(),
        detail: format!(
            "step `{expected}` is no longer current, the record is at `{}`",
            step_key(record.current_approval_step)
        ),
    })
}

fn step_key(step: Option<ApprovalRole>) -> &'static str {
    step.map(|role| role.as_str()).unwrap_or("none")
}
