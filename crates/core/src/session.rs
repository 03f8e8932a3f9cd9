use std::sync::Arc;

use crate::domain::ids::{ChannelId, GuildId, MessageId, UserId};
use crate::domain::reaction::ReactionSymbol;
use crate::registry::{ClosedTicket, CreatedTicket, RegistryError, TicketRegistry};

/// How an interaction reached the bot. Handlers behave the same either way;
/// the origin mostly matters for error reporting, which is silent on the
/// reaction path and message-based on the command path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOrigin {
    Command { message_id: MessageId },
    Reaction { message_id: MessageId, symbol: ReactionSymbol },
}

/// The acting user and the place the interaction happened, captured once at
/// the gateway edge so handler code never re-derives them from raw events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub actor: UserId,
    pub origin: SessionOrigin,
}

impl SessionContext {
    pub fn for_command(
        guild_id: GuildId,
        channel_id: ChannelId,
        actor: UserId,
        message_id: MessageId,
    ) -> Self {
        Self { guild_id, channel_id, actor, origin: SessionOrigin::Command { message_id } }
    }

    pub fn for_reaction(
        guild_id: GuildId,
        channel_id: ChannelId,
        actor: UserId,
        message_id: MessageId,
        symbol: ReactionSymbol,
    ) -> Self {
        Self { guild_id, channel_id, actor, origin: SessionOrigin::Reaction { message_id, symbol } }
    }

    pub fn message_id(&self) -> MessageId {
        match self.origin {
            SessionOrigin::Command { message_id } => message_id,
            SessionOrigin::Reaction { message_id, .. } => message_id,
        }
    }
}

/// One interaction's view of the registry. Lifecycle calls take the actor
/// and channel from the context instead of asking the caller to thread them
/// through every handler.
pub struct Session {
    registry: Arc<TicketRegistry>,
    context: SessionContext,
}

impl Session {
    pub fn new(registry: Arc<TicketRegistry>, context: SessionContext) -> Self {
        Self { registry, context }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn create_ticket(&self, subject: Option<&str>) -> Result<CreatedTicket, RegistryError> {
        self.registry.create_ticket(self.context.actor, subject).await
    }

    /// Closes the ticket the interaction happened in.
    pub async fn close_ticket(&self, reason: Option<&str>) -> Result<ClosedTicket, RegistryError> {
        self.registry.close_ticket(self.context.actor, self.context.channel_id, reason).await
    }

    pub async fn add_user(&self, user: UserId) -> Result<(), RegistryError> {
        self.registry.add_user(self.context.channel_id, user).await
    }

    pub async fn remove_user(&self, user: UserId) -> Result<(), RegistryError> {
        self.registry.remove_user(self.context.channel_id, user).await
    }

    pub async fn setup_intake_message(&self) -> Result<MessageId, RegistryError> {
        self.registry.setup_intake_message().await
    }
}
