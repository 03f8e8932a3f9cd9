use std::fs;
use std::future::Future;
use std::path::Path;

use serde::Serialize;
use serde_json::json;
use ticketry_core::config::{AppConfig, LoadOptions, StorageBackend};
use ticketry_core::TicketStore;
use ticketry_db::{connect_with_config, JsonTicketStore};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: Status,
    details: String,
}

impl Check {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: Status::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: Status::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: Status::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    overall_status: Status,
    summary: String,
    checks: Vec<Check>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let passed = report.overall_status == Status::Pass;
    let exit_code = if passed { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string(&report).unwrap_or_else(|error| {
            json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        });
        return CommandResult { exit_code, output };
    }

    let message = render_human(&report);
    if passed {
        CommandResult::success("doctor", message)
    } else {
        CommandResult::failure("doctor", "readiness", message, exit_code)
    }
}

fn build_report() -> Report {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            Check::pass("config_validation", "configuration loaded and validated"),
            check_store(&config),
            check_transcript_dir(Path::new(&config.tickets.transcript_dir)),
        ],
        Err(error) => {
            let reason = "skipped until the configuration loads";
            vec![
                Check::fail("config_validation", error.to_string()),
                Check::skipped("store_connectivity", reason),
                Check::skipped("transcript_dir", reason),
            ]
        }
    };

    let healthy = checks.iter().all(|check| check.status == Status::Pass);
    Report {
        overall_status: if healthy { Status::Pass } else { Status::Fail },
        summary: if healthy {
            "doctor: every readiness check passed".to_string()
        } else {
            "doctor: readiness checks reported problems".to_string()
        },
        checks,
    }
}

fn check_store(config: &AppConfig) -> Check {
    match config.database.backend {
        StorageBackend::Sqlite => check_sqlite_store(config),
        StorageBackend::Json => check_json_store(&config.database.path),
    }
}

fn on_runtime<T>(probe: impl Future<Output = Result<T, String>>) -> Result<T, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("async runtime unavailable: {error}"))?;
    runtime.block_on(probe)
}

fn check_sqlite_store(config: &AppConfig) -> Check {
    let probe = on_runtime(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("database connection failed: {error}"))?;

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tickets'",
        )
        .fetch_one(&pool)
        .await
        .map_err(|error| format!("schema probe failed: {error}"))?;

        pool.close().await;
        Ok(tables == 1)
    });

    match probe {
        Ok(true) => Check::pass(
            "store_connectivity",
            format!("connected using `{}`; schema present", config.database.url),
        ),
        Ok(false) => Check::fail(
            "store_connectivity",
            "connected but the ticket schema is missing; run `ticketry migrate`",
        ),
        Err(details) => Check::fail("store_connectivity", details),
    }
}

fn check_json_store(path: &str) -> Check {
    let store = JsonTicketStore::new(path);
    match on_runtime(async { store.ticket_count().await.map_err(|error| error.to_string()) }) {
        Ok(count) => Check::pass(
            "store_connectivity",
            format!("state file `{path}` readable; {count} tickets issued so far"),
        ),
        Err(details) => {
            Check::fail("store_connectivity", format!("state file `{path}` unreadable: {details}"))
        }
    }
}

fn check_transcript_dir(dir: &Path) -> Check {
    match fs::create_dir_all(dir) {
        Ok(()) => {
            Check::pass("transcript_dir", format!("transcript directory `{}` ready", dir.display()))
        }
        Err(error) => Check::fail(
            "transcript_dir",
            format!("transcript directory `{}` unusable: {error}", dir.display()),
        ),
    }
}

fn render_human(report: &Report) -> String {
    let mut lines = vec![report.summary.clone()];
    lines.extend(report.checks.iter().map(|check| {
        let marker = match check.status {
            Status::Pass => "ok",
            Status::Fail => "fail",
            Status::Skipped => "skip",
        };
        format!("- [{marker}] {}: {}", check.name, check.details)
    }));
    lines.join("\n")
}
