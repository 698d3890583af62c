use serde_json::json;

use crate::commands::{
    build_runtime, load_config, open_pool, workflow_service, ActorArgs, CommandFailure,
    CommandResult,
};
use tripflow_core::chain::ApprovalRole;
use tripflow_core::domain::record::{RecordId, WorkflowRecord};
use tripflow_core::history::{approval_summary, record_view};

#[derive(Debug, Clone, Copy)]
enum Transition<'a> {
    Submit,
    Approve { expected_step: ApprovalRole },
    Reject { expected_step: ApprovalRole, reason: &'a str },
}

impl Transition<'_> {
    fn command(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
        }
    }
}

pub fn submit(record_id: &str, actor: &ActorArgs) -> CommandResult {
    run(record_id, actor, Transition::Submit)
}

/// `expected_step` is the step the actor saw (`current_approval_step` from
/// `show`); a record that has moved past it is reported as a conflict.
pub fn approve(
    record_id: &str,
    actor: &ActorArgs,
    expected_step: ApprovalRole,
) -> CommandResult {
    run(record_id, actor, Transition::Approve { expected_step })
}

pub fn reject(
    record_id: &str,
    actor: &ActorArgs,
    expected_step: ApprovalRole,
    reason: &str,
) -> CommandResult {
    run(record_id, actor, Transition::Reject { expected_step, reason })
}

fn run(record_id: &str, actor: &ActorArgs, transition: Transition<'_>) -> CommandResult {
    let command = transition.command();
    let correlation_id = actor.correlation_id();

    match apply(record_id, actor, transition, &correlation_id) {
        Ok(record) => {
            let message = format!("{}: {}", record.number, approval_summary(&record));
            let data = serde_json::to_value(record_view(&record)).unwrap_or_else(|_| json!({}));
            CommandResult::success_with_data(command, message, Some(correlation_id), data)
        }
        Err(failure) => failure.into_result(command, &correlation_id),
    }
}

fn apply(
    record_id: &str,
    actor: &ActorArgs,
    transition: Transition<'_>,
    correlation_id: &str,
) -> Result<WorkflowRecord, CommandFailure> {
    let config = load_config()?;
    let runtime = build_runtime()?;
    let record_id = RecordId(record_id.to_string());
    let acting_user = actor.acting_user();

    runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = workflow_service(pool.clone(), &config);
        let outcome = match transition {
            Transition::Submit => service.submit(&record_id, &acting_user, correlation_id).await,
            Transition::Approve { expected_step } => {
                service.approve(&record_id, &acting_user, expected_step, correlation_id).await
            }
            Transition::Reject { expected_step, reason } => {
                service
                    .reject(&record_id, &acting_user, expected_step, reason, correlation_id)
                    .await
            }
        };
        pool.close().await;
        Ok::<WorkflowRecord, CommandFailure>(outcome?)
    })
}
