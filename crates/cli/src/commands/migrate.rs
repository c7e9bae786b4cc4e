use crate::commands::{connect, load_config, runtime, CommandResult, Failure, EXIT_MIGRATION};
use purchasing_db::migrations;

pub fn run() -> CommandResult {
    match execute() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}

fn execute() -> Result<(), Failure> {
    let config = load_config()?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = connect(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;
        Ok(())
    })
}
