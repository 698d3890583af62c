use tripflow_core::audit::{AuditOutcome, InMemoryAuditSink};
use tripflow_core::chain::{ApprovalRole, APPROVAL_CHAIN};
use tripflow_core::domain::employee::ActingUser;
use tripflow_core::domain::record::{RecordId, RecordStatus};
use tripflow_core::errors::{ApplicationError, WorkflowError};
use tripflow_core::flows::ApprovalEngine;
use tripflow_core::history::{approval_summary, latest_approval};
use tripflow_core::service::WorkflowService;
use tripflow_core::store::WorkflowRecordStore;
use tripflow_db::{
    connect_with_settings, migrations, DemoSeedDataset, SqlDirectory, SqlWorkflowRecordStore,
};

type SqlService = WorkflowService<SqlWorkflowRecordStore, SqlDirectory, InMemoryAuditSink>;

async fn seeded_service() -> SqlService {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed");

    WorkflowService::with_audit(
        SqlWorkflowRecordStore::new(pool.clone()),
        SqlDirectory::new(pool),
        InMemoryAuditSink::default(),
        ApprovalEngine::default(),
    )
}

fn actor(employee_id: &str) -> ActingUser {
    ActingUser::employee(format!("user-{employee_id}"), employee_id)
}

#[tokio::test]
async fn cash_advance_trip_walks_every_role_through_sqlite() {
    let service = seeded_service().await;
    let record_id = RecordId("BT-001".to_string());

    service.submit(&record_id, &actor("E-100"), "req-1").await.expect("submit");
    let approvers = ["E-200", "E-300", "E-310", "E-320", "E-330", "E-340"];
    for (approver, role) in approvers.into_iter().zip(APPROVAL_CHAIN) {
        service.approve(&record_id, &actor(approver), role, "req-2").await.expect("approve");
    }

    let record = service.get(&record_id).await.expect("reload");
    assert_eq!(record.status, RecordStatus::Approved);
    assert_eq!(record.current_approval_step, None);
    assert_eq!(record.approvals.len(), 6);
    assert_eq!(latest_approval(&record).map(|latest| latest.role), Some(ApprovalRole::StaffFa));
    assert_eq!(approval_summary(&record), "Approved by Staff FA");
}

#[tokio::test]
async fn trip_without_cash_advance_ends_at_staff_ga() {
    let service = seeded_service().await;
    let record_id = RecordId("BT-002".to_string());

    service.submit(&record_id, &actor("E-101"), "req-1").await.expect("submit");
    service
        .approve(&record_id, &actor("E-200"), ApprovalRole::Supervisor, "req-2")
        .await
        .expect("supervisor");
    let record = service
        .approve(&record_id, &actor("E-300"), ApprovalRole::StaffGa, "req-3")
        .await
        .expect("staff ga");

    assert_eq!(record.status, RecordStatus::Approved);
    assert!(record.approvals.get(ApprovalRole::SpvGa).is_none());
    assert_eq!(service.get(&record_id).await.expect("reload"), record);
}

#[tokio::test]
async fn stale_version_is_rejected_by_the_sql_store() {
    let service = seeded_service().await;
    let record_id = RecordId("BT-002".to_string());
    let submitted = service.submit(&record_id, &actor("E-101"), "req-1").await.expect("submit");

    let roster = service.roster_for(&submitted).await.expect("roster");
    let engine = ApprovalEngine::default();
    let first = engine
        .approve(&submitted, &actor("E-200"), &roster, chrono::Utc::now())
        .expect("first outcome");
    let second = engine
        .approve(&submitted, &actor("E-200"), &roster, chrono::Utc::now())
        .expect("second outcome from the same read");

    service
        .store()
        .compare_and_update(&record_id, submitted.version, &first.patch)
        .await
        .expect("first write wins");
    let error = service
        .store()
        .compare_and_update(&record_id, submitted.version, &second.patch)
        .await
        .expect_err("second write loses");
    assert!(matches!(
        ApplicationError::from(error),
        ApplicationError::Workflow(WorkflowError::Conflict { .. })
    ));
}

#[tokio::test]
async fn repeated_approval_of_one_step_conflicts_and_changes_nothing() {
    let service = seeded_service().await;
    let record_id = RecordId("BT-001".to_string());
    service.submit(&record_id, &actor("E-100"), "req-1").await.expect("submit");

    let first = service
        .approve(&record_id, &actor("E-200"), ApprovalRole::Supervisor, "click-1")
        .await
        .expect("first click");
    let error = service
        .approve(&record_id, &actor("E-200"), ApprovalRole::Supervisor, "click-2")
        .await
        .expect_err("second click on the same step");
    assert_eq!(error.class(), "conflict");

    let stored = service.get(&record_id).await.expect("reload");
    assert_eq!(stored, first);
    assert_eq!(stored.version, 2);
    assert_eq!(stored.current_approval_step, Some(ApprovalRole::StaffGa));
    assert_eq!(
        stored.approvals.approved_by(ApprovalRole::Supervisor).map(|id| id.0.as_str()),
        Some("E-200")
    );
}

#[tokio::test]
async fn rejection_and_pending_inbox() {
    let service = seeded_service().await;
    for (record_id, subject) in [("BT-001", "E-100"), ("BT-002", "E-101"), ("EC-001", "E-100")] {
        service
            .submit(&RecordId(record_id.to_string()), &actor(subject), "req-1")
            .await
            .expect("submit");
    }

    let inbox = service.pending_for(&actor("E-200"), 50).await.expect("pending");
    assert_eq!(inbox.len(), 3);
    assert!(service.pending_for(&actor("E-300"), 50).await.expect("pending").is_empty());

    let rejected = service
        .reject(
            &RecordId("EC-001".to_string()),
            &actor("E-200"),
            ApprovalRole::Supervisor,
            "  duplicate claim  ",
            "req-2",
        )
        .await
        .expect("reject");
    assert_eq!(rejected.status, RecordStatus::Rejected);
    assert_eq!(approval_summary(&rejected), "Rejected by E-200: duplicate claim");

    let inbox = service.pending_for(&actor("E-200"), 50).await.expect("pending");
    let ids: Vec<_> = inbox.iter().map(|record| record.id.0.as_str()).collect();
    assert_eq!(ids, vec!["BT-001", "BT-002"]);

    let error = service
        .approve(
            &RecordId("EC-001".to_string()),
            &actor("E-200"),
            ApprovalRole::Supervisor,
            "req-3",
        )
        .await
        .expect_err("rejected record is final");
    assert_eq!(error.class(), "invalid_state");
    let last = service.audit().events().pop().expect("audit event");
    assert_eq!(last.outcome, AuditOutcome::Rejected);
}
