use crate::commands::{
    connect, load_config, runtime, CommandResult, Failure, EXIT_MIGRATION, EXIT_SEED,
};
use purchasing_db::{migrations, SeedDataset, SeedResult};

pub fn run() -> CommandResult {
    match execute() {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn execute() -> Result<SeedResult, Failure> {
    let config = load_config()?;
    let runtime = runtime()?;

    runtime.block_on(async {
        let pool = connect(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), EXIT_MIGRATION))?;

        let seeded = SeedDataset::load(&pool)
            .await
            .map_err(|error| Failure::new("seed_execution", error.to_string(), EXIT_SEED))?;

        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| Failure::new("seed_verification", error.to_string(), EXIT_SEED))?;

        pool.close().await;

        if !verification.all_present {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            return Err(Failure::new(
                "seed_verification",
                verification_message(&failed_checks),
                EXIT_SEED,
            ));
        }

        Ok(seeded)
    })
}

fn summary(seeded: &SeedResult) -> String {
    if seeded.is_noop() {
        return "seed dataset already present; nothing created".to_string();
    }

    let mut lines = vec!["seed dataset loaded:".to_string()];
    lines.extend(seeded.roles_created.iter().map(|role| format!("  - role: {role}")));
    lines.extend(seeded.users_created.iter().map(|email| format!("  - user: {email}")));
    lines.join("\n")
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed_checks.join(", "))
    }
}
