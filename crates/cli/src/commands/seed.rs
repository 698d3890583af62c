use serde_json::json;

use crate::commands::{build_runtime, load_config, open_pool, CommandFailure, CommandResult};
use tripflow_db::{DemoSeedDataset, SeedResult};

pub fn run() -> CommandResult {
    match load_demo() {
        Ok(seeded) => {
            let lines: Vec<String> = seeded
                .records_seeded
                .iter()
                .map(|record| {
                    format!("  - {} ({}): {}", record.record_id, record.subject, record.description)
                })
                .collect();
            let message = format!(
                "demo organization `{}` loaded with {} employees and {} draft records:\n{}",
                seeded.org_unit_id,
                seeded.employees_seeded,
                seeded.records_seeded.len(),
                lines.join("\n")
            );
            let data = serde_json::to_value(&seeded).unwrap_or_else(|_| json!({}));
            CommandResult::success_with_data("seed", message, None, data)
        }
        Err(failure) => failure.into_result("seed", "unassigned"),
    }
}

fn load_demo() -> Result<SeedResult, CommandFailure> {
    let config = load_config()?;
    let runtime = build_runtime()?;
    runtime.block_on(async {
        let pool = open_pool(&config).await?;

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| CommandFailure::setup("seed_execution", error.to_string(), 6))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| CommandFailure::setup("seed_verification", error.to_string(), 6))?;
        pool.close().await;

        if !verification.all_present {
            return Err(CommandFailure::setup(
                "seed_verification",
                verification_failure_message(&verification.checks),
                6,
            ));
        }
        Ok::<SeedResult, CommandFailure>(seeded)
    })
}

fn verification_failure_message(checks: &[(String, bool)]) -> String {
    let failed: Vec<&str> =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(check.as_str())).collect();
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_message_names_failed_checks() {
        let checks = vec![
            ("employee E-100".to_string(), true),
            ("role bod".to_string(), false),
            ("record BT-002".to_string(), false),
        ];
        assert_eq!(
            verification_failure_message(&checks),
            "seed verification failed for checks: role bod, record BT-002"
        );
    }

    #[test]
    fn verification_message_falls_back_when_nothing_is_labelled() {
        assert_eq!(verification_failure_message(&[]), "some seed data failed to load");
    }
}
