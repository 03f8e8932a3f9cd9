//! Reaction screening.
//!
//! Every reaction event passes through [`ReactionValidator`] before any
//! handler acts on it. The checks run in a fixed order and the first failing
//! one wins, so the cheap rejections (bot actor, unknown symbol) never touch
//! the store. A rejection is not an error: the reaction simply stays inert.

use std::sync::Arc;

use ticketry_core::{ChannelId, ReactionSymbol, StoreError, TicketStore, UserId};

use crate::events::ReactionEvent;

/// Which side of the reaction event the symbol arrived on. The recognized
/// symbol set differs per side: removals only ever matter for 🔒.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionAction {
    Added,
    Removed,
}

impl ReactionAction {
    fn recognizes(self, symbol: ReactionSymbol) -> bool {
        match self {
            ReactionAction::Added => true,
            ReactionAction::Removed => symbol == ReactionSymbol::Lock,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The bot reacted itself. Screening this out first keeps the bot's own
    /// confirmation emoji from re-entering the pipeline as a fresh event.
    BotActor,
    /// The symbol is not one the bot acts on for this action.
    UnrecognizedSymbol,
    /// The channel is neither the intake channel nor a ticket channel.
    UntrackedChannel,
    /// The message is neither the intake message nor a ticket trigger.
    NotATrigger,
}

/// Screening outcome. `Proceed` carries the parsed symbol so handlers never
/// re-parse the raw token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Proceed(ReactionSymbol),
    Reject(RejectReason),
}

pub struct ReactionValidator {
    store: Arc<dyn TicketStore>,
    bot_user_id: UserId,
    intake_channel_id: ChannelId,
}

impl ReactionValidator {
    pub fn new(
        store: Arc<dyn TicketStore>,
        bot_user_id: UserId,
        intake_channel_id: ChannelId,
    ) -> Self {
        Self {
            store,
            bot_user_id,
            intake_channel_id,
        }
    }

    /// Runs the four screening checks in order: actor, symbol, channel,
    /// message. Only the last two consult the store.
    pub async fn validate(
        &self,
        action: ReactionAction,
        event: &ReactionEvent,
    ) -> Result<Verdict, StoreError> {
        if event.actor == self.bot_user_id {
            return Ok(Verdict::Reject(RejectReason::BotActor));
        }

        let Some(symbol) = ReactionSymbol::parse(&event.symbol) else {
            return Ok(Verdict::Reject(RejectReason::UnrecognizedSymbol));
        };
        if !action.recognizes(symbol) {
            return Ok(Verdict::Reject(RejectReason::UnrecognizedSymbol));
        }

        if event.channel_id != self.intake_channel_id
            && !self.store.is_ticket(event.channel_id).await?
        {
            return Ok(Verdict::Reject(RejectReason::UntrackedChannel));
        }

        if !self.store.is_trigger_message(event.message_id).await? {
            return Ok(Verdict::Reject(RejectReason::NotATrigger));
        }

        Ok(Verdict::Proceed(symbol))
    }
}
