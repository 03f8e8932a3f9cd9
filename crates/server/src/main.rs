mod bootstrap;
mod health;

use std::sync::Arc;

use anyhow::Result;
use ticketry_core::config::{AppConfig, LoadOptions, LogFormat};

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(level);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    if app.config.health.enabled {
        health::spawn(
            &app.config.health.bind_address,
            app.config.health.port,
            Arc::clone(&app.store),
        )
        .await?;
    }

    tracing::info!(
        event_name = "system.server.gateway_transport_mode",
        transport_mode = ?app.config.gateway.transport,
        correlation_id = "bootstrap",
        "gateway transport mode initialized"
    );

    app.gateway.start().await?;

    tracing::info!(
        event_name = "system.server.ready",
        correlation_id = "bootstrap",
        "ticketry-server started"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!(
        event_name = "system.server.shutdown",
        correlation_id = "shutdown",
        "ticketry-server stopping"
    );

    Ok(())
}
