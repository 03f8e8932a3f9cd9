use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use ticketry_core::domain::ids::{ChannelId, MessageId, TicketId};
use ticketry_core::domain::ticket::TicketRecord;
use ticketry_core::store::{StoreError, TicketStore};

/// Ticket store persisted as one JSON document, rewritten in full on every
/// mutation. A process-wide mutex serializes read-modify-write cycles, so
/// the file is only safe for a single process. A missing file reads as the
/// empty state; a corrupt file surfaces as a decode error rather than being
/// silently reset.
pub struct JsonTicketStore {
    path: PathBuf,
    guard: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonState {
    ticket_count: u64,
    setup_message_id: Option<i64>,
    tickets: BTreeMap<String, JsonTicket>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonTicket {
    ticket_id: i64,
    trigger_message_id: Option<i64>,
}

impl JsonTicketStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn load(&self) -> Result<JsonState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|error| {
                StoreError::Decode(format!(
                    "corrupt state file `{}`: {error}",
                    self.path.display()
                ))
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(JsonState::default())
            }
            Err(error) => Err(StoreError::Backend(error.to_string())),
        }
    }

    async fn persist(&self, state: &JsonState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|error| StoreError::Backend(error.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|error| StoreError::Backend(error.to_string()))?;
            }
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|error| StoreError::Backend(error.to_string()))
    }
}

fn channel_key(channel_id: ChannelId) -> String {
    channel_id.0.to_string()
}

fn record_from_entry(key: &str, ticket: &JsonTicket) -> Result<TicketRecord, StoreError> {
    let channel_id = key
        .parse::<i64>()
        .map_err(|_| StoreError::Decode(format!("invalid channel key `{key}` in state file")))?;
    Ok(TicketRecord {
        channel_id: ChannelId(channel_id),
        ticket_id: TicketId(ticket.ticket_id),
        trigger_message_id: ticket.trigger_message_id.map(MessageId),
    })
}

#[async_trait]
impl TicketStore for JsonTicketStore {
    async fn is_ticket(&self, channel_id: ChannelId) -> Result<bool, StoreError> {
        let _guard = self.guard.lock().await;
        let state = self.load().await?;
        Ok(state.tickets.contains_key(&channel_key(channel_id)))
    }

    async fn is_trigger_message(&self, message_id: MessageId) -> Result<bool, StoreError> {
        let _guard = self.guard.lock().await;
        let state = self.load().await?;
        if state.setup_message_id == Some(message_id.0) {
            return Ok(true);
        }
        Ok(state
            .tickets
            .values()
            .any(|ticket| ticket.trigger_message_id == Some(message_id.0)))
    }

    async fn next_ticket_id(&self) -> Result<TicketId, StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        state.ticket_count += 1;
        let issued = state.ticket_count;
        self.persist(&state).await?;
        Ok(TicketId(issued as i64))
    }

    async fn create_ticket(
        &self,
        channel_id: ChannelId,
        ticket_id: TicketId,
        trigger_message_id: Option<MessageId>,
    ) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        let key = channel_key(channel_id);
        if state.tickets.contains_key(&key) {
            return Err(StoreError::Duplicate(channel_id));
        }
        state.tickets.insert(
            key,
            JsonTicket {
                ticket_id: ticket_id.0,
                trigger_message_id: trigger_message_id.map(|id| id.0),
            },
        );
        self.persist(&state).await
    }

    async fn attach_trigger_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        let ticket = state
            .tickets
            .get_mut(&channel_key(channel_id))
            .ok_or(StoreError::NotFound(channel_id))?;
        ticket.trigger_message_id = Some(message_id.0);
        self.persist(&state).await
    }

    async fn get_ticket(&self, channel_id: ChannelId) -> Result<Option<TicketRecord>, StoreError> {
        let _guard = self.guard.lock().await;
        let state = self.load().await?;
        let key = channel_key(channel_id);
        state.tickets.get(&key).map(|ticket| record_from_entry(&key, ticket)).transpose()
    }

    async fn get_ticket_id(&self, channel_id: ChannelId) -> Result<TicketId, StoreError> {
        let _guard = self.guard.lock().await;
        let state = self.load().await?;
        state
            .tickets
            .get(&channel_key(channel_id))
            .map(|ticket| TicketId(ticket.ticket_id))
            .ok_or(StoreError::NotFound(channel_id))
    }

    async fn remove_ticket(&self, channel_id: ChannelId) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        if state.tickets.remove(&channel_key(channel_id)).is_none() {
            return Err(StoreError::NotFound(channel_id));
        }
        self.persist(&state).await
    }

    async fn ticket_count(&self) -> Result<u64, StoreError> {
        let _guard = self.guard.lock().await;
        Ok(self.load().await?.ticket_count)
    }

    async fn increment_ticket_count(&self) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        state.ticket_count += 1;
        self.persist(&state).await
    }

    async fn decrement_ticket_count(&self) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        state.ticket_count = state.ticket_count.saturating_sub(1);
        self.persist(&state).await
    }

    async fn setup_message_id(&self) -> Result<Option<MessageId>, StoreError> {
        let _guard = self.guard.lock().await;
        Ok(self.load().await?.setup_message_id.map(MessageId))
    }

    async fn save_setup_message(&self, message_id: MessageId) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        state.setup_message_id = Some(message_id.0);
        self.persist(&state).await
    }
}
