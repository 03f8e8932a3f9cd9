//! Event handlers binding gateway traffic to the ticket registry.
//!
//! Three handlers cover the whole surface: prefixed messages become commands,
//! reaction additions drive ticket opening and closing, and reaction removals
//! retract the bot's close confirmation. Reaction-path refusals stay silent;
//! command-path refusals reply in the channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ticketry_core::{
    ChatPlatform, ReactionSymbol, RegistryError, Session, SessionContext, TicketRegistry, UserId,
};

use crate::commands::{parse_command, CommandParseError, TicketCommand};
use crate::events::{
    EventContext, EventHandler, EventHandlerError, GatewayEnvelope, GatewayEvent, GatewayEventType,
    HandlerResult, MessageEvent, ReactionEvent,
};
use crate::reactions::{ReactionAction, ReactionValidator, Verdict};

const DENY_CLOSE_NOT_A_TICKET: &str = "I cannot close this as it is not a ticket.";
const DENY_ADD_NOT_A_TICKET: &str =
    "This is not a ticket! Users can only be added to a ticket channel";
const DENY_REMOVE_NOT_A_TICKET: &str =
    "This is not a ticket! Users can only be removed from a ticket channel";
const DENY_NOT_STAFF: &str = "Only staff members can manage ticket participants.";
const DENY_NOT_OWNER: &str = "Only the bot owner can use this command.";

/// Turns prefixed channel messages into ticket commands and runs them.
///
/// Permission gates live here, not in the registry: `sudonew` and `setup`
/// are owner-only, `adduser`/`removeuser` need the staff role. Everything
/// the author may not do gets a short reply instead of an error.
pub struct CommandMessageHandler {
    registry: Arc<TicketRegistry>,
    platform: Arc<dyn ChatPlatform>,
    prefix: String,
    owner_id: UserId,
}

impl CommandMessageHandler {
    pub fn new(
        registry: Arc<TicketRegistry>,
        platform: Arc<dyn ChatPlatform>,
        prefix: impl Into<String>,
        owner_id: UserId,
    ) -> Self {
        Self {
            registry,
            platform,
            prefix: prefix.into(),
            owner_id,
        }
    }

    async fn run_command(
        &self,
        event: &MessageEvent,
        command: TicketCommand,
    ) -> Result<HandlerResult, EventHandlerError> {
        let session = Session::new(
            Arc::clone(&self.registry),
            SessionContext::for_command(
                event.guild_id,
                event.channel_id,
                event.author,
                event.message_id,
            ),
        );

        match command {
            TicketCommand::New { subject } => {
                session.create_ticket(subject.as_deref()).await?;
            }
            TicketCommand::Close { reason } => match session.close_ticket(reason.as_deref()).await {
                Ok(_) => {}
                Err(RegistryError::NotATicket(_)) => {
                    self.reply(event, DENY_CLOSE_NOT_A_TICKET).await?;
                }
                Err(error) => return Err(error.into()),
            },
            TicketCommand::AddUser { user } => {
                if !self.author_is_staff(event) {
                    self.reply(event, DENY_NOT_STAFF).await?;
                } else {
                    match session.add_user(user).await {
                        Ok(()) => {}
                        Err(RegistryError::NotATicket(_)) => {
                            self.reply(event, DENY_ADD_NOT_A_TICKET).await?;
                        }
                        Err(error) => return Err(error.into()),
                    }
                }
            }
            TicketCommand::RemoveUser { user } => {
                if !self.author_is_staff(event) {
                    self.reply(event, DENY_NOT_STAFF).await?;
                } else {
                    match session.remove_user(user).await {
                        Ok(()) => {}
                        Err(RegistryError::NotATicket(_)) => {
                            self.reply(event, DENY_REMOVE_NOT_A_TICKET).await?;
                        }
                        Err(error) => return Err(error.into()),
                    }
                }
            }
            TicketCommand::SudoNew { requester } => {
                if event.author != self.owner_id {
                    self.reply(event, DENY_NOT_OWNER).await?;
                } else {
                    self.registry.create_ticket(requester, None).await?;
                }
            }
            TicketCommand::Setup => {
                if event.author != self.owner_id {
                    self.reply(event, DENY_NOT_OWNER).await?;
                } else {
                    session.setup_intake_message().await?;
                }
            }
        }

        Ok(HandlerResult::Processed)
    }

    fn author_is_staff(&self, event: &MessageEvent) -> bool {
        event
            .author_roles
            .contains(&self.registry.settings().staff_role_id)
    }

    async fn reply(&self, event: &MessageEvent, text: &str) -> Result<(), EventHandlerError> {
        self.platform.send_message(event.channel_id, text).await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for CommandMessageHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::Message
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(parsed) = parse_command(&self.prefix, &event.content) else {
            return Ok(HandlerResult::Ignored);
        };
        let command = match parsed {
            Ok(command) => command,
            Err(CommandParseError::UnknownVerb { verb }) => {
                debug!(verb = %verb, "dropping unknown command verb");
                return Ok(HandlerResult::Ignored);
            }
            Err(error) => {
                self.reply(event, &error.to_string()).await?;
                return Ok(HandlerResult::Processed);
            }
        };
        self.run_command(event, command).await
    }
}

/// Acts on validated reaction additions.
///
/// The confirmation emoji on the intake message opens a ticket for the
/// reactor and then clears their reaction so the trigger is immediately
/// reusable. The lock on any trigger arms the bot's confirmation emoji, and
/// the confirmation emoji on a ticket trigger closes that ticket.
pub struct ReactionAddedHandler {
    registry: Arc<TicketRegistry>,
    platform: Arc<dyn ChatPlatform>,
    validator: ReactionValidator,
}

impl ReactionAddedHandler {
    pub fn new(registry: Arc<TicketRegistry>, platform: Arc<dyn ChatPlatform>) -> Self {
        let validator = validator_for(&registry);
        Self {
            registry,
            platform,
            validator,
        }
    }
}

#[async_trait]
impl EventHandler for ReactionAddedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let symbol = match self.validator.validate(ReactionAction::Added, event).await? {
            Verdict::Proceed(symbol) => symbol,
            Verdict::Reject(reason) => {
                debug!(?reason, channel_id = event.channel_id.0, "reaction screened out");
                return Ok(HandlerResult::Ignored);
            }
        };

        let setup_message = self.registry.store().setup_message_id().await?;
        match symbol {
            ReactionSymbol::Confirm if setup_message == Some(event.message_id) => {
                reaction_session(&self.registry, event, symbol)
                    .create_ticket(None)
                    .await?;
                // Clear the reactor's emoji so the intake message reads the
                // same for the next requester.
                self.platform
                    .remove_reaction(
                        event.channel_id,
                        event.message_id,
                        ReactionSymbol::Confirm,
                        event.actor,
                    )
                    .await?;
            }
            ReactionSymbol::Lock => {
                self.platform
                    .add_reaction(event.channel_id, event.message_id, ReactionSymbol::Confirm)
                    .await?;
            }
            ReactionSymbol::Confirm => {
                match reaction_session(&self.registry, event, symbol)
                    .close_ticket(None)
                    .await
                {
                    Ok(_) => {}
                    // The record vanished between screening and closing.
                    Err(RegistryError::NotATicket(_)) => return Ok(HandlerResult::Ignored),
                    Err(error) => return Err(error.into()),
                }
            }
        }

        Ok(HandlerResult::Processed)
    }
}

/// Acts on validated reaction removals: a withdrawn lock retracts the bot's
/// confirmation emoji, disarming the close.
pub struct ReactionRemovedHandler {
    registry: Arc<TicketRegistry>,
    platform: Arc<dyn ChatPlatform>,
    validator: ReactionValidator,
}

impl ReactionRemovedHandler {
    pub fn new(registry: Arc<TicketRegistry>, platform: Arc<dyn ChatPlatform>) -> Self {
        let validator = validator_for(&registry);
        Self {
            registry,
            platform,
            validator,
        }
    }
}

#[async_trait]
impl EventHandler for ReactionRemovedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionRemoved
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _context: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionRemoved(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        match self.validator.validate(ReactionAction::Removed, event).await? {
            Verdict::Proceed(_) => {}
            Verdict::Reject(reason) => {
                debug!(?reason, channel_id = event.channel_id.0, "reaction removal screened out");
                return Ok(HandlerResult::Ignored);
            }
        }

        self.platform
            .remove_reaction(
                event.channel_id,
                event.message_id,
                ReactionSymbol::Confirm,
                self.registry.settings().bot_user_id,
            )
            .await?;

        Ok(HandlerResult::Processed)
    }
}

fn validator_for(registry: &Arc<TicketRegistry>) -> ReactionValidator {
    let settings = registry.settings();
    ReactionValidator::new(
        Arc::clone(registry.store()),
        settings.bot_user_id,
        settings.intake_channel_id,
    )
}

fn reaction_session(
    registry: &Arc<TicketRegistry>,
    event: &ReactionEvent,
    symbol: ReactionSymbol,
) -> Session {
    Session::new(
        Arc::clone(registry),
        SessionContext::for_reaction(
            event.guild_id,
            event.channel_id,
            event.actor,
            event.message_id,
            symbol,
        ),
    )
}
