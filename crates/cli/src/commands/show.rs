use serde_json::json;

use crate::commands::{
    build_runtime, load_config, open_pool, workflow_service, CommandFailure, CommandResult,
};
use tripflow_core::domain::record::RecordId;
use tripflow_core::history::{record_view, RecordView};

pub fn run(record_id: &str) -> CommandResult {
    match load_view(record_id) {
        Ok(view) => {
            let message = format!("{} {}: {}", view.number, view.status_label.text, view.summary);
            let data = serde_json::to_value(&view).unwrap_or_else(|_| json!({}));
            CommandResult::success_with_data("show", message, None, data)
        }
        Err(failure) => failure.into_result("show", "unassigned"),
    }
}

fn load_view(record_id: &str) -> Result<RecordView, CommandFailure> {
    let config = load_config()?;
    let runtime = build_runtime()?;
    runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = workflow_service(pool.clone(), &config);
        let record = service.get(&RecordId(record_id.to_string())).await;
        pool.close().await;
        Ok::<RecordView, CommandFailure>(record_view(&record?))
    })
}
