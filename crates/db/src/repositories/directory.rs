use async_trait::async_trait;
use sqlx::Row;

use tripflow_core::chain::ApprovalRole;
use tripflow_core::domain::employee::{Employee, EmployeeId, OrgUnitId, RoleAssignment};
use tripflow_core::store::{DirectoryStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// Employees, their supervisors and the per-unit role table.
pub struct SqlDirectory {
    pool: DbPool,
}

impl SqlDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_org_unit(&self, id: &OrgUnitId, name: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO org_unit (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(&id.0)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_employee(&self, employee: &Employee) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO employee (id, name, org_unit_id, supervisor_id)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 org_unit_id = excluded.org_unit_id,
                 supervisor_id = excluded.supervisor_id",
        )
        .bind(&employee.id.0)
        .bind(&employee.name)
        .bind(&employee.org_unit_id.0)
        .bind(employee.supervisor_id.as_ref().map(|id| id.0.clone()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replaces the whole role table of `org_unit_id`.
    pub async fn save_assignment(
        &self,
        org_unit_id: &OrgUnitId,
        assignment: &RoleAssignment,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_assignment WHERE org_unit_id = ?")
            .bind(&org_unit_id.0)
            .execute(&mut *tx)
            .await?;

        for (role, employee_id) in assignment.assignees() {
            sqlx::query(
                "INSERT INTO role_assignment (org_unit_id, role, employee_id) VALUES (?, ?, ?)",
            )
            .bind(&org_unit_id.0)
            .bind(role.as_str())
            .bind(&employee_id.0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, org_unit_id, supervisor_id FROM employee WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
        let supervisor_id: Option<String> = row.try_get("supervisor_id").map_err(decode)?;
        Ok(Some(Employee {
            id: EmployeeId(row.try_get("id").map_err(decode)?),
            name: row.try_get("name").map_err(decode)?,
            org_unit_id: OrgUnitId(row.try_get("org_unit_id").map_err(decode)?),
            supervisor_id: supervisor_id.map(EmployeeId),
        }))
    }

    async fn load_assignment(
        &self,
        org_unit_id: &OrgUnitId,
    ) -> Result<Option<RoleAssignment>, RepositoryError> {
        let rows =
            sqlx::query("SELECT role, employee_id FROM role_assignment WHERE org_unit_id = ?")
                .bind(&org_unit_id.0)
                .fetch_all(&self.pool)
                .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut assignment = RoleAssignment::new(org_unit_id.clone());
        for row in &rows {
            let role: String =
                row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let employee_id: String =
                row.try_get("employee_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let role = ApprovalRole::parse(&role)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown approval role `{role}`")))?;
            assignment.assign(role, EmployeeId(employee_id));
        }
        Ok(Some(assignment))
    }
}

#[async_trait]
impl DirectoryStore for SqlDirectory {
    async fn find_employee(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        Ok(self.load_employee(id).await?)
    }

    async fn role_assignment(
        &self,
        org_unit_id: &OrgUnitId,
    ) -> Result<Option<RoleAssignment>, StoreError> {
        Ok(self.load_assignment(org_unit_id).await?)
    }
}
