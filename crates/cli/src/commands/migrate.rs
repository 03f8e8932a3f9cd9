use crate::commands::CommandResult;
use ticketry_core::config::{AppConfig, LoadOptions, StorageBackend};
use ticketry_db::{connect_with_config, migrations};

struct MigrateFailure {
    class: &'static str,
    message: String,
    exit_code: u8,
}

pub fn run() -> CommandResult {
    match apply_pending() {
        Ok(message) => CommandResult::success("migrate", message),
        Err(failure) => {
            CommandResult::failure("migrate", failure.class, failure.message, failure.exit_code)
        }
    }
}

fn apply_pending() -> Result<&'static str, MigrateFailure> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| MigrateFailure {
        class: "config_validation",
        message: format!("configuration did not load: {error}"),
        exit_code: 2,
    })?;

    if config.database.backend == StorageBackend::Json {
        return Ok("json backend keeps no schema; nothing to migrate");
    }

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            MigrateFailure {
                class: "runtime_init",
                message: format!("async runtime unavailable: {error}"),
                exit_code: 3,
            }
        })?;

    runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(|error| MigrateFailure {
            class: "db_connectivity",
            message: error.to_string(),
            exit_code: 4,
        })?;
        migrations::run_pending(&pool).await.map_err(|error| MigrateFailure {
            class: "migration",
            message: error.to_string(),
            exit_code: 5,
        })?;
        pool.close().await;
        Ok(())
    })?;

    Ok("database schema is up to date")
}
