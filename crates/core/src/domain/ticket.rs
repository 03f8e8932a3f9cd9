use serde::{Deserialize, Serialize};

use crate::domain::ids::{ChannelId, MessageId, TicketId};

/// One open ticket: the association between a dedicated channel, its ticket
/// number, and the control message whose reactions drive lock/close.
///
/// `trigger_message_id` is `None` only during the short window between channel
/// creation and the welcome message being posted. A ticket stuck in that state
/// (welcome post failed) stays open but its reaction controls are inert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub channel_id: ChannelId,
    pub ticket_id: TicketId,
    pub trigger_message_id: Option<MessageId>,
}

impl TicketRecord {
    pub fn new(channel_id: ChannelId, ticket_id: TicketId) -> Self {
        Self { channel_id, ticket_id, trigger_message_id: None }
    }

    pub fn with_trigger(mut self, message_id: MessageId) -> Self {
        self.trigger_message_id = Some(message_id);
        self
    }
}
