use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use ticketry_core::TicketStore;
use tracing::{error, info};

const READY: &str = "ready";
const DEGRADED: &str = "degraded";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub status: &'static str,
    pub detail: String,
}

impl Probe {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: READY, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: DEGRADED, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: Probe,
    pub storage: Probe,
    pub checked_at: String,
}

pub fn router(store: Arc<dyn TicketStore>) -> Router {
    Router::new().route("/health", get(health)).with_state(store)
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    store: Arc<dyn TicketStore>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((bind_address, port)).await?;
    let address = listener.local_addr()?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint listening"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(store)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint exited with an error"
            );
        }
    });

    Ok(())
}

pub async fn health(
    State(store): State<Arc<dyn TicketStore>>,
) -> (StatusCode, Json<HealthReport>) {
    let storage = storage_probe(store.as_ref()).await;
    let all_ready = storage.status == READY;

    let report = HealthReport {
        status: if all_ready { READY } else { DEGRADED },
        service: Probe::ready("ticketry-server runtime initialized"),
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let code = if all_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}

/// Probes whichever backend is wired through the store trait; the counter
/// read touches the backing medium on every backend.
async fn storage_probe(store: &dyn TicketStore) -> Probe {
    match store.ticket_count().await {
        Ok(count) => Probe::ready(format!("store reachable; {count} tickets issued so far")),
        Err(error) => Probe::degraded(format!("store query failed: {error}")),
    }
}
