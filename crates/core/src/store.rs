//! Persistence boundary for workflow records and the employee directory.
//!
//! The engine never writes records itself. It hands a [`RecordPatch`] to
//! [`WorkflowRecordStore::compare_and_update`], which applies it only if the
//! record still has the version the patch was computed from.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::chain::ApprovalRole;
use crate::domain::employee::{Employee, EmployeeId, OrgUnitId, RoleAssignment};
use crate::domain::record::{RecordId, RecordKind, RecordPatch, RecordStatus, WorkflowRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("record `{record_id}` update rejected: {detail}")]
    Conflict { record_id: RecordId, detail: String },
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn record_not_found(id: &RecordId) -> Self {
        Self::NotFound { entity: "workflow record", id: id.0.clone() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub kind: Option<RecordKind>,
    pub status: Option<RecordStatus>,
    pub current_step: Option<ApprovalRole>,
    pub subject_employee_id: Option<EmployeeId>,
    pub org_unit_id: Option<OrgUnitId>,
    pub limit: Option<u32>,
}

impl RecordFilter {
    pub fn with_status(status: RecordStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn matches(&self, record: &WorkflowRecord) -> bool {
        self.kind.map_or(true, |kind| record.kind == kind)
            && self.status.map_or(true, |status| record.status == status)
            && self.current_step.map_or(true, |step| record.current_approval_step == Some(step))
            && self
                .subject_employee_id
                .as_ref()
                .map_or(true, |id| record.subject_employee_id == *id)
            && self.org_unit_id.as_ref().map_or(true, |id| record.org_unit_id == *id)
    }
}

#[async_trait]
pub trait WorkflowRecordStore: Send + Sync {
    async fn get(&self, id: &RecordId) -> Result<WorkflowRecord, StoreError>;

    async fn insert(&self, record: WorkflowRecord) -> Result<(), StoreError>;

    /// Applies `patch` only while the stored version equals `expected_version`,
    /// then bumps the version. Fails with `Conflict` otherwise.
    async fn compare_and_update(
        &self,
        id: &RecordId,
        expected_version: u64,
        patch: &RecordPatch,
    ) -> Result<WorkflowRecord, StoreError>;

    /// Oldest first.
    async fn list_by_filter(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<WorkflowRecord>, StoreError>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError>;

    async fn role_assignment(
        &self,
        org_unit_id: &OrgUnitId,
    ) -> Result<Option<RoleAssignment>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    records: RwLock<HashMap<RecordId, WorkflowRecord>>,
}

#[async_trait]
impl WorkflowRecordStore for InMemoryWorkflowStore {
    async fn get(&self, id: &RecordId) -> Result<WorkflowRecord, StoreError> {
        let records = self.records.read().await;
        records.get(id).cloned().ok_or_else(|| StoreError::record_not_found(id))
    }

    async fn insert(&self, record: WorkflowRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::Conflict {
                record_id: record.id.clone(),
                detail: "record already exists".to_string(),
            });
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn compare_and_update(
        &self,
        id: &RecordId,
        expected_version: u64,
        patch: &RecordPatch,
    ) -> Result<WorkflowRecord, StoreError> {
        let mut records = self.records.write().await;
        let stored = records.get(id).ok_or_else(|| StoreError::record_not_found(id))?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                record_id: id.clone(),
                detail: format!("expected version {expected_version}, found {}", stored.version),
            });
        }

        let mut updated = stored.clone();
        patch.apply_to(&mut updated).map_err(|conflict| StoreError::Conflict {
            record_id: id.clone(),
            detail: conflict.to_string(),
        })?;
        updated.version += 1;
        records.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    async fn list_by_filter(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<WorkflowRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<WorkflowRecord> =
            records.values().filter(|record| filter.matches(record)).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    employees: RwLock<HashMap<EmployeeId, Employee>>,
    assignments: RwLock<HashMap<OrgUnitId, RoleAssignment>>,
}

impl InMemoryDirectory {
    pub async fn add_employee(&self, employee: Employee) {
        let mut employees = self.employees.write().await;
        employees.insert(employee.id.clone(), employee);
    }

    pub async fn set_assignment(&self, org_unit_id: OrgUnitId, assignment: RoleAssignment) {
        let mut assignments = self.assignments.write().await;
        assignments.insert(org_unit_id, assignment);
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn find_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        let employees = self.employees.read().await;
        Ok(employees.get(id).cloned())
    }

    async fn role_assignment(
        &self,
        org_unit_id: &OrgUnitId,
    ) -> Result<Option<RoleAssignment>, StoreError> {
        let assignments = self.assignments.read().await;
        Ok(assignments.get(org_unit_id).cloned())
    }
}
