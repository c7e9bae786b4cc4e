use purchasing_core::config::AppConfig;
use purchasing_db::SeedDataset;
use serde::Serialize;

use crate::commands::{
    connect, load_config, runtime, CommandResult, EXIT_CONNECTIVITY, EXIT_MIGRATION, EXIT_SEED,
};

const SCHEMA_TABLES: &[&str] =
    &["users", "roles", "user_roles", "requests", "comment_requests", "audit_requests"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: 0 }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: format!("skipped because {reason}"),
            exit_code: 0,
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    /// Exit code of the first failing check, or 0.
    fn exit_code(&self) -> u8 {
        self.checks
            .iter()
            .find(|check| check.status == CheckStatus::Fail)
            .map(|check| check.exit_code)
            .unwrap_or(0)
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match load_config() {
        Ok(config) => {
            let mut checks =
                vec![DoctorCheck::pass("config_validation", "configuration loaded and validated")];
            checks.extend(check_database(&config));
            checks
        }
        Err(failure) => vec![
            DoctorCheck::fail("config_validation", failure.message, failure.exit_code),
            DoctorCheck::skipped("database_connectivity", "configuration did not load"),
            DoctorCheck::skipped("schema_readiness", "configuration did not load"),
            DoctorCheck::skipped("seed_accounts", "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Connectivity, then schema, then seed accounts. Later checks are skipped once
/// an earlier one fails.
fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(failure) => {
            return vec![
                DoctorCheck::fail("database_connectivity", failure.message, failure.exit_code),
                DoctorCheck::skipped("schema_readiness", "the async runtime did not start"),
                DoctorCheck::skipped("seed_accounts", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect(config).await {
            Ok(pool) => pool,
            Err(failure) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {}", failure.message),
                        EXIT_CONNECTIVITY,
                    ),
                    DoctorCheck::skipped("schema_readiness", "the database is unreachable"),
                    DoctorCheck::skipped("seed_accounts", "the database is unreachable"),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];

        let missing = match missing_tables(&pool).await {
            Ok(missing) => missing,
            Err(error) => {
                checks.push(DoctorCheck::fail("schema_readiness", error.to_string(), EXIT_MIGRATION));
                checks.push(DoctorCheck::skipped("seed_accounts", "the schema could not be read"));
                pool.close().await;
                return checks;
            }
        };

        if !missing.is_empty() {
            checks.push(DoctorCheck::fail(
                "schema_readiness",
                format!("missing tables: {}; run `purchasing migrate`", missing.join(", ")),
                EXIT_MIGRATION,
            ));
            checks.push(DoctorCheck::skipped("seed_accounts", "the schema is incomplete"));
            pool.close().await;
            return checks;
        }
        checks.push(DoctorCheck::pass("schema_readiness", "all purchasing tables present"));

        checks.push(match SeedDataset::verify(&pool).await {
            Ok(verification) if verification.all_present => {
                DoctorCheck::pass("seed_accounts", "baseline roles and accounts present")
            }
            Ok(verification) => {
                let missing = verification
                    .checks
                    .iter()
                    .filter_map(|(check, present)| (!present).then_some(*check))
                    .collect::<Vec<_>>();
                DoctorCheck::fail(
                    "seed_accounts",
                    format!("missing: {}; run `purchasing seed`", missing.join(", ")),
                    EXIT_SEED,
                )
            }
            Err(error) => DoctorCheck::fail("seed_accounts", error.to_string(), EXIT_SEED),
        });

        pool.close().await;
        checks
    })
}

async fn missing_tables(pool: &purchasing_db::DbPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let mut missing = Vec::new();
    for table in SCHEMA_TABLES {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(pool)
                .await?;
        if count == 0 {
            missing.push(*table);
        }
    }
    Ok(missing)
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
