use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_EMPLOYEE_IDS: &[&str] =
    &["E-100", "E-101", "E-200", "E-300", "E-310", "E-320", "E-330", "E-340"];

const SEED_ROLES: &[(&str, &str)] = &[
    ("staff_ga", "E-300"),
    ("spv_ga", "E-310"),
    ("hr_manager", "E-320"),
    ("bod", "E-330"),
    ("staff_fa", "E-340"),
];

const SEED_RECORDS: &[SeedRecordContract] = &[
    SeedRecordContract {
        record_id: "BT-001",
        subject: "E-100",
        description: "Business trip with a cash advance, walks the whole chain",
    },
    SeedRecordContract {
        record_id: "BT-002",
        subject: "E-101",
        description: "Business trip without cash advance, approved after Staff GA",
    },
    SeedRecordContract {
        record_id: "EC-001",
        subject: "E-100",
        description: "Expense claim without cash advance",
    },
];

#[derive(Debug, Clone, Copy)]
struct SeedRecordContract {
    record_id: &'static str,
    subject: &'static str,
    description: &'static str,
}

/// Demo organization for trying the approval chain from the CLI: unit `hq`,
/// every chain role staffed, and three drafts ready for submission.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Idempotent; rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(SeedResult {
            org_unit_id: "hq",
            employees_seeded: SEED_EMPLOYEE_IDS.len(),
            records_seeded: SEED_RECORDS
                .iter()
                .map(|record| RecordSeedInfo {
                    record_id: record.record_id,
                    subject: record.subject,
                    description: record.description,
                })
                .collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for employee_id in SEED_EMPLOYEE_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM employee WHERE id = ?1)")
                    .bind(employee_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("employee {employee_id}"), exists == 1));
        }

        for (role, employee_id) in SEED_ROLES {
            let assigned: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM role_assignment
                               WHERE org_unit_id = 'hq' AND role = ?1 AND employee_id = ?2)",
            )
            .bind(role)
            .bind(employee_id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("role {role}"), assigned == 1));
        }

        for record in SEED_RECORDS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM workflow_record
                               WHERE id = ?1 AND subject_employee_id = ?2)",
            )
            .bind(record.record_id)
            .bind(record.subject)
            .fetch_one(pool)
            .await?;
            checks.push((format!("record {}", record.record_id), exists == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub org_unit_id: &'static str,
    pub employees_seeded: usize,
    pub records_seeded: Vec<RecordSeedInfo>,
}

#[derive(Debug, Serialize)]
pub struct RecordSeedInfo {
    pub record_id: &'static str,
    pub subject: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

#[cfg(test)]
mod tests {
    use super::DemoSeedDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let before = DemoSeedDataset::verify(&pool).await.expect("verify empty");
        assert!(!before.all_present);

        let seeded = DemoSeedDataset::load(&pool).await.expect("seed");
        assert_eq!(seeded.records_seeded.len(), 3);
        DemoSeedDataset::load(&pool).await.expect("seed twice");

        let after = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(after.all_present, "failed checks: {:?}", after.checks);
    }
}
