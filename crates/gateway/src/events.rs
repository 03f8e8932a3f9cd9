//! Inbound gateway event model and dispatch.
//!
//! The transport layer ([`crate::runner`]) hands every decoded frame to the
//! [`EventDispatcher`] as a [`GatewayEnvelope`]. Handlers register per event
//! type; anything without a handler is acknowledged and dropped so an
//! unexpected frame can never wedge the ingest loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use ticketry_core::{
    ChannelId, GuildId, MessageId, PlatformError, RegistryError, RoleId, StoreError, UserId,
};

/// One decoded frame from the chat platform, paired with the transport-level
/// id used to acknowledge it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub event: GatewayEvent,
}

/// Payload of a channel message, carried whether or not it turns out to be a
/// command. Prefix matching happens in the handler, not the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub author: UserId,
    pub author_roles: Vec<RoleId>,
    pub content: String,
}

/// Payload of a reaction being added to or removed from a message. The symbol
/// arrives as the raw string the platform sent; recognition happens in
/// [`crate::reactions::ReactionValidator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub actor: UserId,
    pub symbol: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    Message(MessageEvent),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            GatewayEvent::Message(_) => GatewayEventType::Message,
            GatewayEvent::ReactionAdded(_) => GatewayEventType::ReactionAdded,
            GatewayEvent::ReactionRemoved(_) => GatewayEventType::ReactionRemoved,
            GatewayEvent::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    Message,
    ReactionAdded,
    ReactionRemoved,
    Unsupported,
}

/// Per-envelope metadata threaded through handlers for log correlation.
#[derive(Clone, Debug, Default)]
pub struct EventContext {
    pub correlation_id: Option<String>,
}

impl EventContext {
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
        }
    }
}

/// Outcome of a single dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// The event matched this handler's concern and was acted on.
    Processed,
    /// The event was valid but outside this handler's concern.
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler for {event_type:?} failed: {source}")]
    Handler {
        event_type: GatewayEventType,
        #[source]
        source: EventHandlerError,
    },
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

/// Routes envelopes to the handler registered for their event type.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous handler for the same type.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(handler.event_type(), handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        context: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let event_type = envelope.event.event_type();
        let Some(handler) = self.handlers.get(&event_type) else {
            return Ok(HandlerResult::Ignored);
        };
        handler
            .handle(envelope, context)
            .await
            .map_err(|source| DispatchError::Handler { event_type, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        event_type: GatewayEventType,
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new(event_type: GatewayEventType) -> Self {
            Self {
                event_type,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn event_type(&self) -> GatewayEventType {
            self.event_type
        }

        async fn handle(
            &self,
            _envelope: &GatewayEnvelope,
            _context: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResult::Processed)
        }
    }

    fn message_envelope() -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: "env-1".to_string(),
            event: GatewayEvent::Message(MessageEvent {
                guild_id: GuildId(1),
                channel_id: ChannelId(10),
                message_id: MessageId(100),
                author: UserId(7),
                author_roles: vec![],
                content: "hello".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_registered_handler() {
        let mut dispatcher = EventDispatcher::new();
        let handler = Arc::new(CountingHandler::new(GatewayEventType::Message));
        dispatcher.register(Arc::clone(&handler) as Arc<dyn EventHandler>);
        assert_eq!(dispatcher.handler_count(), 1);

        let result = dispatcher
            .dispatch(&message_envelope(), &EventContext::default())
            .await
            .unwrap();

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispatch_without_a_handler_is_ignored_not_an_error() {
        let dispatcher = EventDispatcher::new();

        let result = dispatcher
            .dispatch(&message_envelope(), &EventContext::default())
            .await
            .unwrap();

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn registering_twice_replaces_the_previous_handler() {
        let mut dispatcher = EventDispatcher::new();
        let first = Arc::new(CountingHandler::new(GatewayEventType::Message));
        let second = Arc::new(CountingHandler::new(GatewayEventType::Message));
        dispatcher.register(Arc::clone(&first) as Arc<dyn EventHandler>);
        dispatcher.register(Arc::clone(&second) as Arc<dyn EventHandler>);
        assert_eq!(dispatcher.handler_count(), 1);

        dispatcher
            .dispatch(&message_envelope(), &EventContext::default())
            .await
            .unwrap();

        assert_eq!(first.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_types_cover_every_variant() {
        let unsupported = GatewayEvent::Unsupported {
            event_type: "presence_update".to_string(),
        };
        assert_eq!(unsupported.event_type(), GatewayEventType::Unsupported);
        assert_eq!(
            message_envelope().event.event_type(),
            GatewayEventType::Message
        );
    }
}
