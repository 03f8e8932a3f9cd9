use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::ids::{ChannelId, MessageId, TicketId};
use crate::domain::ticket::TicketRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no ticket record for channel {0}")]
    NotFound(ChannelId),
    #[error("a ticket record already exists for channel {0}")]
    Duplicate(ChannelId),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored data could not be decoded: {0}")]
    Decode(String),
}

/// Persistence contract for ticket records and the singleton config blob.
///
/// Every operation is atomic with respect to concurrent callers on the same
/// backing medium. Backends are interchangeable and selected by
/// configuration; the registry never knows which one it is talking to.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// True iff a [`TicketRecord`] exists for `channel_id`.
    async fn is_ticket(&self, channel_id: ChannelId) -> Result<bool, StoreError>;

    /// True iff `message_id` is the current setup message or some record's
    /// trigger message.
    async fn is_trigger_message(&self, message_id: MessageId) -> Result<bool, StoreError>;

    /// Atomically increments the ticket counter and returns the new value,
    /// which becomes the new ticket's id. Never returns a previously issued
    /// value, even under concurrent calls. Ids reserved by create flows that
    /// later fail are permanently skipped, not reissued.
    async fn next_ticket_id(&self) -> Result<TicketId, StoreError>;

    /// Inserts a new record. Fails with [`StoreError::Duplicate`] if the
    /// channel already has one.
    async fn create_ticket(
        &self,
        channel_id: ChannelId,
        ticket_id: TicketId,
        trigger_message_id: Option<MessageId>,
    ) -> Result<(), StoreError>;

    /// Sets the record's trigger message after the welcome message is posted.
    async fn attach_trigger_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), StoreError>;

    async fn get_ticket(&self, channel_id: ChannelId) -> Result<Option<TicketRecord>, StoreError>;

    /// Fails with [`StoreError::NotFound`] if no record exists; never falls
    /// back to a default value.
    async fn get_ticket_id(&self, channel_id: ChannelId) -> Result<TicketId, StoreError>;

    /// Deletes the record; fails with [`StoreError::NotFound`] if absent.
    /// Channel deletion and log emission are the caller's responsibility.
    async fn remove_ticket(&self, channel_id: ChannelId) -> Result<(), StoreError>;

    /// Count of tickets ever created; independent of how many records remain.
    async fn ticket_count(&self) -> Result<u64, StoreError>;

    async fn increment_ticket_count(&self) -> Result<(), StoreError>;

    /// Counterpart to [`TicketStore::increment_ticket_count`] for external
    /// rollback tooling. The registry itself never compensates a reserved id.
    async fn decrement_ticket_count(&self) -> Result<(), StoreError>;

    /// Current intake trigger message, if setup has run.
    async fn setup_message_id(&self) -> Result<Option<MessageId>, StoreError>;

    /// Replaces the singleton setup message id. The previous message stays in
    /// the channel but is no longer recognized as a trigger.
    async fn save_setup_message(&self, message_id: MessageId) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct StoreState {
    ticket_count: u64,
    setup_message_id: Option<MessageId>,
    tickets: HashMap<ChannelId, TicketRecord>,
}

/// Map-backed store used by registry and gateway tests, and as the reference
/// semantics the durable backends are checked against.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    state: Mutex<StoreState>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the counter at `count`, as if that many tickets had already
    /// been created.
    pub async fn seed_ticket_count(&self, count: u64) {
        self.state.lock().await.ticket_count = count;
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn is_ticket(&self, channel_id: ChannelId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.tickets.contains_key(&channel_id))
    }

    async fn is_trigger_message(&self, message_id: MessageId) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        if state.setup_message_id == Some(message_id) {
            return Ok(true);
        }
        Ok(state.tickets.values().any(|record| record.trigger_message_id == Some(message_id)))
    }

    async fn next_ticket_id(&self) -> Result<TicketId, StoreError> {
        let mut state = self.state.lock().await;
        state.ticket_count += 1;
        Ok(TicketId(state.ticket_count as i64))
    }

    async fn create_ticket(
        &self,
        channel_id: ChannelId,
        ticket_id: TicketId,
        trigger_message_id: Option<MessageId>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.tickets.contains_key(&channel_id) {
            return Err(StoreError::Duplicate(channel_id));
        }
        state
            .tickets
            .insert(channel_id, TicketRecord { channel_id, ticket_id, trigger_message_id });
        Ok(())
    }

    async fn attach_trigger_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record =
            state.tickets.get_mut(&channel_id).ok_or(StoreError::NotFound(channel_id))?;
        record.trigger_message_id = Some(message_id);
        Ok(())
    }

    async fn get_ticket(&self, channel_id: ChannelId) -> Result<Option<TicketRecord>, StoreError> {
        Ok(self.state.lock().await.tickets.get(&channel_id).copied())
    }

    async fn get_ticket_id(&self, channel_id: ChannelId) -> Result<TicketId, StoreError> {
        self.state
            .lock()
            .await
            .tickets
            .get(&channel_id)
            .map(|record| record.ticket_id)
            .ok_or(StoreError::NotFound(channel_id))
    }

    async fn remove_ticket(&self, channel_id: ChannelId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.tickets.remove(&channel_id).map(|_| ()).ok_or(StoreError::NotFound(channel_id))
    }

    async fn ticket_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.ticket_count)
    }

    async fn increment_ticket_count(&self) -> Result<(), StoreError> {
        self.state.lock().await.ticket_count += 1;
        Ok(())
    }

    async fn decrement_ticket_count(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.ticket_count = state.ticket_count.saturating_sub(1);
        Ok(())
    }

    async fn setup_message_id(&self) -> Result<Option<MessageId>, StoreError> {
        Ok(self.state.lock().await.setup_message_id)
    }

    async fn save_setup_message(&self, message_id: MessageId) -> Result<(), StoreError> {
        self.state.lock().await.setup_message_id = Some(message_id);
        Ok(())
    }
}
