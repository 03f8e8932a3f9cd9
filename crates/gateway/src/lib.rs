//! Chat-platform gateway for the ticket bot.
//!
//! This crate owns everything between the realtime connection and the
//! ticket registry:
//!
//! - [`runner`] - the transport abstraction and the connect/receive/ack
//!   ingest loop with reconnect backoff
//! - [`events`] - the inbound event model and the per-type dispatcher
//! - [`commands`] - parsing for the `..`-prefixed command family
//! - [`reactions`] - the four-step screen every reaction passes before a
//!   handler may act on it
//! - [`handlers`] - the handlers that turn screened events into registry
//!   calls and channel replies
//! - [`log_sink`] - audit log delivery to the operations channel
//!
//! The crate never talks to storage directly; all state flows through the
//! registry and its store.

pub mod commands;
pub mod events;
pub mod handlers;
pub mod log_sink;
pub mod reactions;
pub mod runner;

pub use commands::{parse_command, parse_user_mention, CommandParseError, TicketCommand};
pub use events::{
    DispatchError, EventContext, EventDispatcher, EventHandler, EventHandlerError, GatewayEnvelope,
    GatewayEvent, GatewayEventType, HandlerResult, MessageEvent, ReactionEvent,
};
pub use handlers::{CommandMessageHandler, ReactionAddedHandler, ReactionRemovedHandler};
pub use log_sink::ChannelLogSink;
pub use reactions::{ReactionAction, ReactionValidator, RejectReason, Verdict};
pub use runner::{
    GatewayRunner, GatewayTransport, NoopGatewayTransport, ReconnectPolicy, TransportError,
};
