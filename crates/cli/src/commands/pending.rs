use serde_json::json;

use crate::commands::{
    build_runtime, load_config, open_pool, workflow_service, ActorArgs, CommandFailure,
    CommandResult,
};
use tripflow_core::history::{record_view, RecordView};

pub fn run(actor: &ActorArgs, limit: Option<u32>) -> CommandResult {
    let correlation_id = actor.correlation_id();
    match load_inbox(actor, limit) {
        Ok(views) => {
            let message = format!("{} record(s) waiting for {}", views.len(), actor.actor);
            let data = json!({ "records": views });
            CommandResult::success_with_data("pending", message, Some(correlation_id), data)
        }
        Err(failure) => failure.into_result("pending", &correlation_id),
    }
}

fn load_inbox(actor: &ActorArgs, limit: Option<u32>) -> Result<Vec<RecordView>, CommandFailure> {
    let config = load_config()?;
    let limit = limit.unwrap_or(config.workflow.list_limit) as usize;
    let runtime = build_runtime()?;
    let acting_user = actor.acting_user();

    runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = workflow_service(pool.clone(), &config);
        let pending = service.pending_for(&acting_user, limit).await;
        pool.close().await;
        Ok::<Vec<RecordView>, CommandFailure>(pending?.iter().map(record_view).collect())
    })
}
