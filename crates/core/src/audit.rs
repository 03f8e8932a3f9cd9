use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::platform::PlatformError;

/// Embed color of ticket-creation log entries.
pub const COLOR_TICKET_CREATED: u32 = 0xB4DA55;
/// Embed color of ticket-close log entries.
pub const COLOR_TICKET_CLOSED: u32 = 0xF42069;
/// Embed color of operational notices (degraded deliveries and the like).
pub const COLOR_NOTICE: u32 = 0x808080;

/// One entry for the operational log channel. Entries are best-effort:
/// callers log delivery failures and move on rather than failing the
/// operation that produced the entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditLogEntry {
    pub entry_id: String,
    pub title: String,
    pub body: String,
    pub color: u32,
    pub attachment: Option<PathBuf>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(title: impl Into<String>, body: impl Into<String>, color: u32) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            color,
            attachment: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }
}

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn emit(&self, entry: AuditLogEntry) -> Result<(), PlatformError>;
}

#[derive(Clone, Default)]
pub struct InMemoryLogSink {
    entries: Arc<Mutex<Vec<AuditLogEntry>>>,
}

impl InMemoryLogSink {
    pub fn entries(&self) -> Vec<AuditLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl LogSink for InMemoryLogSink {
    async fn emit(&self, entry: AuditLogEntry) -> Result<(), PlatformError> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditLogEntry, InMemoryLogSink, LogSink, COLOR_TICKET_CLOSED};

    #[tokio::test]
    async fn in_memory_sink_records_entries_in_order() {
        let sink = InMemoryLogSink::default();

        sink.emit(AuditLogEntry::new("Closed Ticked: Id 3", "Close Reason: done", COLOR_TICKET_CLOSED))
            .await
            .expect("emit");
        sink.emit(
            AuditLogEntry::new("second", "body", COLOR_TICKET_CLOSED)
                .with_attachment("transcripts/3.txt"),
        )
        .await
        .expect("emit");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Closed Ticked: Id 3");
        assert_eq!(entries[1].attachment.as_deref().and_then(|p| p.to_str()), Some("transcripts/3.txt"));
        assert!(!entries[0].entry_id.is_empty());
    }
}
