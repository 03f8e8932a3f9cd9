//! Gateway transport and the ingest loop.
//!
//! [`GatewayTransport`] abstracts the realtime connection to the chat
//! platform. The [`GatewayRunner`] owns the connect/receive/acknowledge
//! cycle and reconnects with exponential backoff when the connection drops.
//! Handler failures are logged and the envelope is acknowledged anyway; a
//! bad event must never stall the stream behind it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, GatewayEnvelope};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("gateway connect failed: {0}")]
    Connect(String),
    #[error("gateway receive failed: {0}")]
    Receive(String),
    #[error("gateway acknowledge failed: {0}")]
    Acknowledge(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

/// Reconnect schedule for the ingest loop. Delays double per attempt up to
/// the cap.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

impl ReconnectPolicy {
    fn backoff_delay(&self, attempt: u32) -> Duration {
        // Cap the exponent so the shift cannot overflow.
        let exponent = attempt.min(16);
        let multiplier = 1u64 << exponent;
        let delay = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Realtime connection to the chat platform.
///
/// `next_envelope` returns `Ok(None)` when the platform ends the stream
/// cleanly; any transport fault is an `Err` and triggers a reconnect.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that connects successfully and delivers nothing. Keeps the
/// process runnable without platform credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Owns the gateway ingest loop for the lifetime of the process.
pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: Arc<EventDispatcher>,
    policy: ReconnectPolicy,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: Arc<EventDispatcher>,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            policy,
        }
    }

    /// Runs the ingest loop until the stream ends cleanly or the reconnect
    /// budget is spent. Exhausting the budget is logged, not fatal; the rest
    /// of the process (health endpoint included) keeps running.
    pub async fn start(&self) -> anyhow::Result<()> {
        for attempt in 0..=self.policy.max_retries {
            match self.connect_and_pump().await {
                Ok(()) => {
                    info!(
                        event_name = "ingress.gateway.stream_ended",
                        "gateway stream ended cleanly"
                    );
                    return Ok(());
                }
                Err(error) => {
                    warn!(
                        attempt,
                        error = %error,
                        "gateway connection lost"
                    );
                    if attempt == self.policy.max_retries {
                        break;
                    }
                    tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
                }
            }
        }
        warn!("gateway reconnect budget spent; continuing process without crash");
        Ok(())
    }

    async fn connect_and_pump(&self) -> Result<(), TransportError> {
        self.transport.connect().await?;
        info!(
            event_name = "ingress.gateway.connected",
            "gateway transport connected"
        );

        while let Some(envelope) = self.transport.next_envelope().await? {
            let context = EventContext::with_correlation_id(envelope.envelope_id.clone());
            info!(
                event_name = "ingress.gateway.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                "envelope received"
            );
            match self.dispatcher.dispatch(&envelope, &context).await {
                Ok(result) => {
                    debug!(
                        envelope_id = %envelope.envelope_id,
                        result = ?result,
                        "envelope dispatched"
                    );
                }
                Err(error) => {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        error = %error,
                        "handler failed; envelope dropped"
                    );
                }
            }
            self.transport.acknowledge(&envelope.envelope_id).await?;
        }

        self.transport.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Mutex;

    use crate::events::{
        EventHandler, EventHandlerError, GatewayEvent, GatewayEventType, HandlerResult,
    };

    struct ScriptedTransport {
        connects: Mutex<VecDeque<Result<(), TransportError>>>,
        envelopes: Mutex<VecDeque<GatewayEnvelope>>,
        acknowledged: Mutex<Vec<String>>,
        connect_calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(
            connects: Vec<Result<(), TransportError>>,
            envelopes: Vec<GatewayEnvelope>,
        ) -> Self {
            Self {
                connects: Mutex::new(connects.into()),
                envelopes: Mutex::new(envelopes.into()),
                acknowledged: Mutex::new(Vec::new()),
                connect_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.connects
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
            Ok(self.envelopes.lock().await.pop_front())
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            self.acknowledged.lock().await.push(envelope_id.to_string());
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct RecordingHandler {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn event_type(&self) -> GatewayEventType {
            GatewayEventType::Unsupported
        }

        async fn handle(
            &self,
            _envelope: &GatewayEnvelope,
            _context: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResult::Processed)
        }
    }

    fn envelope(id: &str) -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: id.to_string(),
            event: GatewayEvent::Unsupported {
                event_type: "test_frame".to_string(),
            },
        }
    }

    fn fast_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[tokio::test]
    async fn reconnects_after_an_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Err(TransportError::Connect("boom".to_string())), Ok(())],
            vec![envelope("env-1")],
        ));
        let handler = Arc::new(RecordingHandler {
            seen: AtomicUsize::new(0),
        });
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Arc::clone(&handler) as Arc<dyn EventHandler>);
        let runner = GatewayRunner::new(
            Arc::clone(&transport) as Arc<dyn GatewayTransport>,
            Arc::new(dispatcher),
            fast_policy(3),
        );

        runner.start().await.unwrap();

        assert_eq!(transport.connect_calls.load(Ordering::SeqCst), 2);
        assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
        assert_eq!(
            transport.acknowledged.lock().await.clone(),
            vec!["env-1".to_string()]
        );
    }

    #[tokio::test]
    async fn spending_the_reconnect_budget_is_not_a_crash() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                Err(TransportError::Connect("down".to_string())),
                Err(TransportError::Connect("down".to_string())),
                Err(TransportError::Connect("down".to_string())),
            ],
            vec![],
        ));
        let runner = GatewayRunner::new(
            Arc::clone(&transport) as Arc<dyn GatewayTransport>,
            Arc::new(EventDispatcher::new()),
            fast_policy(2),
        );

        let outcome = runner.start().await;

        assert!(outcome.is_ok());
        assert_eq!(transport.connect_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unclaimed_envelopes_are_still_acknowledged() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![Ok(())],
            vec![envelope("env-a"), envelope("env-b")],
        ));
        let runner = GatewayRunner::new(
            Arc::clone(&transport) as Arc<dyn GatewayTransport>,
            Arc::new(EventDispatcher::new()),
            ReconnectPolicy::default(),
        );

        runner.start().await.unwrap();

        assert_eq!(
            transport.acknowledged.lock().await.clone(),
            vec!["env-a".to_string(), "env-b".to_string()]
        );
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(5), Duration::from_millis(1_000));
        // Far past the cap the shift saturates instead of overflowing.
        assert_eq!(policy.backoff_delay(63), Duration::from_millis(1_000));
    }
}
