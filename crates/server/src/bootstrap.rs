use std::sync::Arc;

use thiserror::Error;
use ticketry_core::config::{AppConfig, ConfigError, LoadOptions, StorageBackend, TransportMode};
use ticketry_core::{
    ChatPlatform, InMemoryPlatform, LogSink, RegistrySettings, TicketRegistry, TicketStore,
};
use ticketry_db::{connect_with_config, migrations, DbPool, JsonTicketStore, SqliteTicketStore};
use ticketry_gateway::{
    ChannelLogSink, CommandMessageHandler, EventDispatcher, EventHandler, GatewayRunner,
    GatewayTransport, NoopGatewayTransport, ReactionAddedHandler, ReactionRemovedHandler,
    ReconnectPolicy,
};
use tracing::info;

/// Fully wired runtime, ready for the gateway loop to start.
///
/// The platform stays the in-memory double until a real client lands; the
/// rest of the wiring (store, registry, dispatcher) is production-shaped and
/// does not change when one does.
pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn TicketStore>,
    /// Present only for the sqlite backend.
    pub db_pool: Option<DbPool>,
    pub platform: Arc<InMemoryPlatform>,
    pub registry: Arc<TicketRegistry>,
    pub gateway: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let (store, db_pool): (Arc<dyn TicketStore>, Option<DbPool>) = match config.database.backend {
        StorageBackend::Sqlite => {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(BootstrapError::DatabaseConnect)?;
            info!(
                event_name = "system.bootstrap.database_connected",
                correlation_id = "bootstrap",
                "database connection established"
            );
            migrations::run_pending(&pool).await.map_err(BootstrapError::Migration)?;
            info!(
                event_name = "system.bootstrap.migrations_applied",
                correlation_id = "bootstrap",
                "database migrations applied"
            );
            (Arc::new(SqliteTicketStore::new(pool.clone())), Some(pool))
        }
        StorageBackend::Json => {
            info!(
                event_name = "system.bootstrap.json_store_selected",
                correlation_id = "bootstrap",
                path = %config.database.path,
                "json state file selected"
            );
            (Arc::new(JsonTicketStore::new(config.database.path.clone())), None)
        }
    };

    let platform = Arc::new(InMemoryPlatform::new());
    let log: Arc<dyn LogSink> = Arc::new(ChannelLogSink::new(
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        config.gateway.log_channel_id,
    ));
    let registry = Arc::new(TicketRegistry::new(
        Arc::clone(&store),
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        log,
        RegistrySettings {
            guild_id: config.gateway.guild_id,
            bot_user_id: config.gateway.bot_user_id,
            intake_channel_id: config.gateway.intake_channel_id,
            ticket_category_id: config.gateway.ticket_category_id,
            staff_role_id: config.gateway.staff_role_id,
            transcript_dir: config.tickets.transcript_dir.clone().into(),
        },
    ));

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Arc::new(CommandMessageHandler::new(
        Arc::clone(&registry),
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        config.tickets.command_prefix.clone(),
        config.gateway.owner_id,
    )) as Arc<dyn EventHandler>);
    dispatcher.register(Arc::new(ReactionAddedHandler::new(
        Arc::clone(&registry),
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
    )) as Arc<dyn EventHandler>);
    dispatcher.register(Arc::new(ReactionRemovedHandler::new(
        Arc::clone(&registry),
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
    )) as Arc<dyn EventHandler>);
    info!(
        event_name = "system.bootstrap.gateway_wired",
        correlation_id = "bootstrap",
        handler_count = dispatcher.handler_count(),
        "gateway dispatcher wired"
    );

    let transport: Arc<dyn GatewayTransport> = match config.gateway.transport {
        TransportMode::Noop => Arc::new(NoopGatewayTransport),
    };
    let policy = ReconnectPolicy {
        max_retries: config.gateway.reconnect_attempts,
        base_delay_ms: config.gateway.reconnect_delay_secs.saturating_mul(1_000),
        max_delay_ms: 60_000,
    };
    let gateway = GatewayRunner::new(transport, Arc::new(dispatcher), policy);

    Ok(Application {
        config,
        store,
        db_pool,
        platform,
        registry,
        gateway,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;
    use ticketry_core::config::{ConfigOverrides, LoadOptions};
    use ticketry_core::UserId;

    use crate::bootstrap::bootstrap;

    fn options_for(config_path: &Path) -> LoadOptions {
        LoadOptions {
            config_path: Some(config_path.to_path_buf()),
            require_file: true,
            ..LoadOptions::default()
        }
    }

    fn write_config(dir: &TempDir, database_section: &str) -> std::path::PathBuf {
        let transcript_dir = dir.path().join("transcripts");
        let contents = format!(
            r#"
{database_section}

[gateway]
bot_token = "token-test"
bot_user_id = 2
guild_id = 1
intake_channel_id = 10
log_channel_id = 11
ticket_category_id = 20
staff_role_id = 30
owner_id = 40

[tickets]
transcript_dir = "{}"
"#,
            transcript_dir.display()
        );
        let path = dir.path().join("ticketry.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("gateway.bot_token"));
    }

    #[tokio::test]
    async fn sqlite_bootstrap_covers_migrations_and_the_ticket_lifecycle() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            "[database]\nbackend = \"sqlite\"\nurl = \"sqlite::memory:?cache=shared\"\nmax_connections = 1",
        );

        let app = bootstrap(options_for(&config_path)).await.unwrap();

        let pool = app.db_pool.clone().unwrap();
        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('tickets', 'ticket_config')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(table_count, 2);

        app.platform.member_named(UserId(7), "Rin");
        let created = app.registry.create_ticket(UserId(7), Some("vpn broken")).await.unwrap();
        assert!(app.store.is_ticket(created.channel_id).await.unwrap());

        let closed = app
            .registry
            .close_ticket(UserId(7), created.channel_id, Some("solved"))
            .await
            .unwrap();
        assert_eq!(closed.ticket_id, created.ticket_id);
        assert!(!app.store.is_ticket(created.channel_id).await.unwrap());
        // The counter keeps counting issued tickets after the close.
        assert_eq!(app.store.ticket_count().await.unwrap(), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn json_bootstrap_runs_without_a_database() {
        let dir = TempDir::new().unwrap();
        let state_path = dir.path().join("state.json");
        let config_path = write_config(
            &dir,
            &format!(
                "[database]\nbackend = \"json\"\npath = \"{}\"",
                state_path.display()
            ),
        );

        let app = bootstrap(options_for(&config_path)).await.unwrap();
        assert!(app.db_pool.is_none());

        app.platform.member_named(UserId(7), "Rin");
        app.registry.create_ticket(UserId(7), None).await.unwrap();
        assert!(state_path.exists());
        assert_eq!(app.store.ticket_count().await.unwrap(), 1);
    }
}
