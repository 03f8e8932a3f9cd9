//! Audit log delivery to the operations channel.

use std::sync::Arc;

use async_trait::async_trait;

use ticketry_core::{AuditLogEntry, ChannelId, ChatPlatform, LogSink, PlatformError};

/// Posts audit entries to the configured log channel as formatted messages.
///
/// The text rendering keeps the title, body, and attachment path; the entry
/// color is embed metadata for richer transports and is not rendered here.
pub struct ChannelLogSink {
    platform: Arc<dyn ChatPlatform>,
    channel: ChannelId,
}

impl ChannelLogSink {
    pub fn new(platform: Arc<dyn ChatPlatform>, channel: ChannelId) -> Self {
        Self { platform, channel }
    }

    fn render(entry: &AuditLogEntry) -> String {
        let mut text = format!("**{}**\n{}", entry.title, entry.body);
        if let Some(path) = &entry.attachment {
            text.push_str(&format!("\nAttachment: {}", path.display()));
        }
        text
    }
}

#[async_trait]
impl LogSink for ChannelLogSink {
    async fn emit(&self, entry: AuditLogEntry) -> Result<(), PlatformError> {
        self.platform
            .send_message(self.channel, &Self::render(&entry))
            .await?;
        Ok(())
    }
}
