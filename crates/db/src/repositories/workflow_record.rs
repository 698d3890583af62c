use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::debug;

use tripflow_core::chain::ApprovalRole;
use tripflow_core::domain::employee::{EmployeeId, OrgUnitId};
use tripflow_core::domain::record::{
    ApprovalTrail, RecordId, RecordKind, RecordPatch, RecordStatus, Rejection, StepApproval,
    WorkflowRecord,
};
use tripflow_core::store::{RecordFilter, StoreError, WorkflowRecordStore};

use super::{decode_timestamp, encode_timestamp, is_unique_violation, RepositoryError};
use crate::DbPool;

const RECORD_COLUMNS: &str = "id, kind, number, subject_employee_id, org_unit_id, status,
    current_approval_step, cash_advance, rejected_at, rejected_by, rejection_reason,
    version, created_at, updated_at";

pub struct SqlWorkflowRecordStore {
    pool: DbPool,
}

impl SqlWorkflowRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: &RecordId) -> Result<WorkflowRecord, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_record(&mut conn, id).await
    }

    async fn insert_record(&self, record: &WorkflowRecord) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workflow_record (id, kind, number, subject_employee_id, org_unit_id,
                                          status, current_approval_step, cash_advance,
                                          rejected_at, rejected_by, rejection_reason,
                                          version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(record.kind.as_str())
        .bind(&record.number)
        .bind(&record.subject_employee_id.0)
        .bind(&record.org_unit_id.0)
        .bind(record.status.as_str())
        .bind(record.current_approval_step.map(|role| role.as_str()))
        .bind(record.cash_advance.map(|amount| amount.to_string()))
        .bind(record.rejection.as_ref().map(|rejection| encode_timestamp(rejection.rejected_at)))
        .bind(record.rejection.as_ref().map(|rejection| rejection.rejected_by.0.clone()))
        .bind(record.rejection.as_ref().map(|rejection| rejection.reason.clone()))
        .bind(record.version as i64)
        .bind(encode_timestamp(record.created_at))
        .bind(encode_timestamp(record.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                RepositoryError::Conflict {
                    record_id: record.id.clone(),
                    detail: "a record with this id or number already exists".to_string(),
                }
            } else {
                error.into()
            }
        })?;

        for (role, step) in record.approvals.iter() {
            insert_step_approval(&mut tx, &record.id, role, step).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reads, checks and writes inside one transaction. The `version` guard on
    /// the UPDATE and the primary key on `workflow_step_approval` keep a
    /// concurrent writer from slipping in between.
    async fn apply_patch(
        &self,
        id: &RecordId,
        expected_version: u64,
        patch: &RecordPatch,
    ) -> Result<WorkflowRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut record = load_record(&mut tx, id).await?;

        if record.version != expected_version {
            return Err(RepositoryError::Conflict {
                record_id: id.clone(),
                detail: format!("expected version {expected_version}, found {}", record.version),
            });
        }

        patch.apply_to(&mut record).map_err(|conflict| RepositoryError::Conflict {
            record_id: id.clone(),
            detail: conflict.to_string(),
        })?;
        record.version += 1;

        let result = sqlx::query(
            "UPDATE workflow_record
             SET status = ?, current_approval_step = ?, rejected_at = ?, rejected_by = ?,
                 rejection_reason = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(record.status.as_str())
        .bind(record.current_approval_step.map(|role| role.as_str()))
        .bind(record.rejection.as_ref().map(|rejection| encode_timestamp(rejection.rejected_at)))
        .bind(record.rejection.as_ref().map(|rejection| rejection.rejected_by.0.clone()))
        .bind(record.rejection.as_ref().map(|rejection| rejection.reason.clone()))
        .bind(record.version as i64)
        .bind(encode_timestamp(record.updated_at))
        .bind(&id.0)
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                record_id: id.clone(),
                detail: format!("version {expected_version} was superseded"),
            });
        }

        if let Some((role, step)) = &patch.step_approval {
            insert_step_approval(&mut tx, id, *role, step).await?;
        }

        tx.commit().await?;
        debug!(
            event_name = "db.workflow_record.updated",
            record_id = %id,
            version = record.version,
            status = record.status.as_str(),
            "workflow record updated"
        );
        Ok(record)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<WorkflowRecord>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RECORD_COLUMNS} FROM workflow_record WHERE 1 = 1"
        ));
        if let Some(kind) = filter.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(step) = filter.current_step {
            builder.push(" AND current_approval_step = ").push_bind(step.as_str());
        }
        if let Some(subject) = &filter.subject_employee_id {
            builder.push(" AND subject_employee_id = ").push_bind(subject.0.clone());
        }
        if let Some(org_unit_id) = &filter.org_unit_id {
            builder.push(" AND org_unit_id = ").push_bind(org_unit_id.0.clone());
        }
        builder.push(" ORDER BY created_at ASC, id ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let mut conn = self.pool.acquire().await?;
        let rows = builder.build().fetch_all(&mut *conn).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = column(row, "id")?;
            let approvals = load_approvals(&mut conn, &RecordId(id)).await?;
            records.push(row_to_record(row, approvals)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl WorkflowRecordStore for SqlWorkflowRecordStore {
    async fn get(&self, id: &RecordId) -> Result<WorkflowRecord, StoreError> {
        Ok(self.load(id).await?)
    }

    async fn insert(&self, record: WorkflowRecord) -> Result<(), StoreError> {
        Ok(self.insert_record(&record).await?)
    }

    async fn compare_and_update(
        &self,
        id: &RecordId,
        expected_version: u64,
        patch: &RecordPatch,
    ) -> Result<WorkflowRecord, StoreError> {
        Ok(self.apply_patch(id, expected_version, patch).await?)
    }

    async fn list_by_filter(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<WorkflowRecord>, StoreError> {
        Ok(self.list(filter).await?)
    }
}

async fn load_record(
    conn: &mut SqliteConnection,
    id: &RecordId,
) -> Result<WorkflowRecord, RepositoryError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM workflow_record WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::RecordNotFound(id.clone()))?;

    let approvals = load_approvals(conn, id).await?;
    row_to_record(&row, approvals)
}

async fn load_approvals(
    conn: &mut SqliteConnection,
    id: &RecordId,
) -> Result<ApprovalTrail, RepositoryError> {
    let rows = sqlx::query(
        "SELECT role, approved_by, approved_at FROM workflow_step_approval WHERE record_id = ?",
    )
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?;

    let mut trail = ApprovalTrail::default();
    for row in &rows {
        let role: String = column(row, "role")?;
        let role = ApprovalRole::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown approval role `{role}`")))?;
        let approved_by: String = column(row, "approved_by")?;
        let approved_at: String = column(row, "approved_at")?;
        trail
            .stamp(
                role,
                StepApproval {
                    approved_at: decode_timestamp("approved_at", &approved_at)?,
                    approved_by: EmployeeId(approved_by),
                },
            )
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    }
    Ok(trail)
}

async fn insert_step_approval(
    conn: &mut SqliteConnection,
    record_id: &RecordId,
    role: ApprovalRole,
    step: &StepApproval,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO workflow_step_approval (record_id, role, approved_by, approved_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&record_id.0)
    .bind(role.as_str())
    .bind(&step.approved_by.0)
    .bind(encode_timestamp(step.approved_at))
    .execute(&mut *conn)
    .await
    .map_err(|error| {
        if is_unique_violation(&error) {
            RepositoryError::Conflict {
                record_id: record_id.clone(),
                detail: format!("step `{role}` was already approved"),
            }
        } else {
            error.into()
        }
    })?;
    Ok(())
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn row_to_record(
    row: &SqliteRow,
    approvals: ApprovalTrail,
) -> Result<WorkflowRecord, RepositoryError> {
    let kind: String = column(row, "kind")?;
    let status: String = column(row, "status")?;
    let step: Option<String> = column(row, "current_approval_step")?;
    let cash_advance: Option<String> = column(row, "cash_advance")?;
    let rejected_at: Option<String> = column(row, "rejected_at")?;
    let rejected_by: Option<String> = column(row, "rejected_by")?;
    let rejection_reason: Option<String> = column(row, "rejection_reason")?;
    let version: i64 = column(row, "version")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    let current_approval_step = match step {
        Some(step) => Some(
            ApprovalRole::parse(&step)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown approval step `{step}`")))?,
        ),
        None => None,
    };
    let cash_advance = match cash_advance {
        Some(amount) => Some(Decimal::from_str(&amount).map_err(|error| {
            RepositoryError::Decode(format!("cash_advance `{amount}`: {error}"))
        })?),
        None => None,
    };
    let rejection = match (rejected_at, rejected_by, rejection_reason) {
        (Some(at), Some(by), Some(reason)) => Some(Rejection {
            rejected_at: decode_timestamp("rejected_at", &at)?,
            rejected_by: EmployeeId(by),
            reason,
        }),
        (None, None, None) => None,
        _ => return Err(RepositoryError::Decode("partial rejection columns".to_string())),
    };

    Ok(WorkflowRecord {
        id: RecordId(column(row, "id")?),
        kind: RecordKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown record kind `{kind}`")))?,
        number: column(row, "number")?,
        subject_employee_id: EmployeeId(column(row, "subject_employee_id")?),
        org_unit_id: OrgUnitId(column(row, "org_unit_id")?),
        status: RecordStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown record status `{status}`")))?,
        current_approval_step,
        approvals,
        rejection,
        cash_advance,
        version: u64::try_from(version)
            .map_err(|_| RepositoryError::Decode(format!("negative version {version}")))?,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}
