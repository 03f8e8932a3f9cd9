use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use ticketry_core::domain::ids::{ChannelId, MessageId, TicketId};
use ticketry_core::domain::ticket::TicketRecord;
use ticketry_core::store::{StoreError, TicketStore};

use crate::DbPool;

use super::map_sqlx;

/// Ticket store backed by the sqlite schema from the workspace migrations.
/// Single-statement writes ride on sqlite's own atomicity; the counter bump
/// uses `UPDATE ... RETURNING` so two concurrent callers can never observe
/// the same value.
pub struct SqliteTicketStore {
    pool: DbPool,
}

impl SqliteTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketStore for SqliteTicketStore {
    async fn is_ticket(&self, channel_id: ChannelId) -> Result<bool, StoreError> {
        let row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM tickets WHERE channel_id = ?) AS present")
                .bind(channel_id.0)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.get::<i64, _>("present") != 0)
    }

    async fn is_trigger_message(&self, message_id: MessageId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM ticket_config WHERE setup_message_id = ?)
                 OR EXISTS(SELECT 1 FROM tickets WHERE trigger_message_id = ?) AS present",
        )
        .bind(message_id.0)
        .bind(message_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.get::<i64, _>("present") != 0)
    }

    async fn next_ticket_id(&self) -> Result<TicketId, StoreError> {
        let row = sqlx::query(
            "UPDATE ticket_config SET ticket_count = ticket_count + 1 WHERE id = 1
             RETURNING ticket_count",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(TicketId(row.get::<i64, _>("ticket_count")))
    }

    async fn create_ticket(
        &self,
        channel_id: ChannelId,
        ticket_id: TicketId,
        trigger_message_id: Option<MessageId>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tickets (channel_id, ticket_id, trigger_message_id) VALUES (?, ?, ?)",
        )
        .bind(channel_id.0)
        .bind(ticket_id.0)
        .bind(trigger_message_id.map(|id| id.0))
        .execute(&self.pool)
        .await
        .map_err(|error| match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(channel_id)
            }
            _ => map_sqlx(error),
        })?;
        Ok(())
    }

    async fn attach_trigger_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tickets SET trigger_message_id = ? WHERE channel_id = ?")
            .bind(message_id.0)
            .bind(channel_id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(channel_id));
        }
        Ok(())
    }

    async fn get_ticket(&self, channel_id: ChannelId) -> Result<Option<TicketRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT channel_id, ticket_id, trigger_message_id FROM tickets WHERE channel_id = ?",
        )
        .bind(channel_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(record_from_row).transpose()
    }

    async fn get_ticket_id(&self, channel_id: ChannelId) -> Result<TicketId, StoreError> {
        let row = sqlx::query("SELECT ticket_id FROM tickets WHERE channel_id = ?")
            .bind(channel_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|row| TicketId(row.get::<i64, _>("ticket_id")))
            .ok_or(StoreError::NotFound(channel_id))
    }

    async fn remove_ticket(&self, channel_id: ChannelId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tickets WHERE channel_id = ?")
            .bind(channel_id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(channel_id));
        }
        Ok(())
    }

    async fn ticket_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT ticket_count FROM ticket_config WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        let count = row.get::<i64, _>("ticket_count");
        u64::try_from(count)
            .map_err(|_| StoreError::Decode(format!("negative ticket_count `{count}`")))
    }

    async fn increment_ticket_count(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE ticket_config SET ticket_count = ticket_count + 1 WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn decrement_ticket_count(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE ticket_config SET ticket_count = MAX(ticket_count - 1, 0) WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn setup_message_id(&self) -> Result<Option<MessageId>, StoreError> {
        let row = sqlx::query("SELECT setup_message_id FROM ticket_config WHERE id = 1")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.get::<Option<i64>, _>("setup_message_id").map(MessageId))
    }

    async fn save_setup_message(&self, message_id: MessageId) -> Result<(), StoreError> {
        sqlx::query("UPDATE ticket_config SET setup_message_id = ? WHERE id = 1")
            .bind(message_id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

fn record_from_row(row: SqliteRow) -> Result<TicketRecord, StoreError> {
    Ok(TicketRecord {
        channel_id: ChannelId(row.try_get("channel_id").map_err(map_sqlx)?),
        ticket_id: TicketId(row.try_get("ticket_id").map_err(map_sqlx)?),
        trigger_message_id: row
            .try_get::<Option<i64>, _>("trigger_message_id")
            .map_err(map_sqlx)?
            .map(MessageId),
    })
}
