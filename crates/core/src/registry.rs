use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{
    AuditLogEntry, LogSink, COLOR_NOTICE, COLOR_TICKET_CLOSED, COLOR_TICKET_CREATED,
};
use crate::domain::ids::{ChannelId, GuildId, MessageId, RoleId, TicketId, UserId};
use crate::domain::reaction::ReactionSymbol;
use crate::platform::{
    ChatPlatform, CreateChannelRequest, Grantee, Member, PlatformError, VisibilityRule,
};
use crate::store::{StoreError, TicketStore};
use crate::transcript::TranscriptWriter;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("channel {0} is not a ticket channel")]
    NotATicket(ChannelId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("failed to write transcript: {0}")]
    Transcript(#[source] std::io::Error),
}

/// Immutable per-process settings the registry needs. Built once at startup
/// from the application config and passed in by reference-counted handle
/// holders; nothing here changes at runtime.
#[derive(Clone, Debug)]
pub struct RegistrySettings {
    pub guild_id: GuildId,
    pub bot_user_id: UserId,
    pub intake_channel_id: ChannelId,
    pub ticket_category_id: ChannelId,
    pub staff_role_id: RoleId,
    pub transcript_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedTicket {
    pub ticket_id: TicketId,
    pub channel_id: ChannelId,
    pub trigger_message_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosedTicket {
    pub ticket_id: TicketId,
    pub transcript_path: PathBuf,
}

/// Orchestrates the ticket lifecycle against the store and the platform
/// collaborators. Holds no state of its own; the store is the single source
/// of truth for which channels are tickets.
pub struct TicketRegistry {
    store: Arc<dyn TicketStore>,
    platform: Arc<dyn ChatPlatform>,
    log: Arc<dyn LogSink>,
    transcripts: TranscriptWriter,
    settings: RegistrySettings,
}

impl TicketRegistry {
    pub fn new(
        store: Arc<dyn TicketStore>,
        platform: Arc<dyn ChatPlatform>,
        log: Arc<dyn LogSink>,
        settings: RegistrySettings,
    ) -> Self {
        let transcripts = TranscriptWriter::new(settings.transcript_dir.clone());
        Self { store, platform, log, transcripts, settings }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Opens a ticket for `requester`.
    ///
    /// The id is reserved first; if any later step fails the id stays
    /// consumed and is never reissued. A failure after the record is
    /// persisted but before the trigger message is attached leaves the
    /// ticket open with inert reaction controls.
    pub async fn create_ticket(
        &self,
        requester: UserId,
        subject: Option<&str>,
    ) -> Result<CreatedTicket, RegistryError> {
        let member = self.platform.resolve_member(self.settings.guild_id, requester).await?;
        let ticket_id = self.store.next_ticket_id().await?;

        let request = CreateChannelRequest {
            name: format!("Support Ticket #{ticket_id}"),
            parent_category: Some(self.settings.ticket_category_id),
            visibility: vec![
                VisibilityRule::hidden(Grantee::Everyone),
                VisibilityRule::visible(Grantee::Member(self.settings.bot_user_id)),
                VisibilityRule::visible(Grantee::Role(self.settings.staff_role_id)),
                VisibilityRule::visible(Grantee::Member(member.id)),
            ],
        };
        let channel_id = self.platform.create_channel(self.settings.guild_id, request).await?;

        self.store.create_ticket(channel_id, ticket_id, None).await?;

        let welcome = welcome_message(&member, self.settings.staff_role_id);
        let trigger_message_id = self.platform.send_message(channel_id, &welcome).await?;
        self.platform.add_reaction(channel_id, trigger_message_id, ReactionSymbol::Lock).await?;
        self.store.attach_trigger_message(channel_id, trigger_message_id).await?;

        let subject = subject.map(str::trim).filter(|subject| !subject.is_empty());
        if let Some(subject) = subject {
            self.platform.send_message(channel_id, &subject_message(subject)).await?;
        }

        self.emit_log(
            AuditLogEntry::new(
                format!("Created ticket with ID {ticket_id}"),
                creation_log_body(&member, channel_id, subject),
                COLOR_TICKET_CREATED,
            ),
        )
        .await;

        info!(
            event_name = "ticket.create.ok",
            channel_id = %channel_id,
            ticket_id = %ticket_id,
            requester = %requester,
            "ticket created"
        );

        Ok(CreatedTicket { ticket_id, channel_id, trigger_message_id })
    }

    /// Closes the ticket living in `channel_id`.
    ///
    /// The transcript is captured and delivered before the channel is
    /// deleted, and the record is removed last so a failed deletion leaves
    /// the store consistent with the channel that still exists.
    pub async fn close_ticket(
        &self,
        closer: UserId,
        channel_id: ChannelId,
        reason: Option<&str>,
    ) -> Result<ClosedTicket, RegistryError> {
        if !self.store.is_ticket(channel_id).await? {
            return Err(RegistryError::NotATicket(channel_id));
        }
        let ticket_id = self.store.get_ticket_id(channel_id).await?;

        let history = self.platform.channel_history(channel_id).await?;
        let transcript_path = self
            .transcripts
            .write(ticket_id, &history)
            .await
            .map_err(RegistryError::Transcript)?;

        self.emit_log(
            AuditLogEntry::new(
                format!("Closed Ticked: Id {ticket_id}"),
                close_log_body(reason),
                COLOR_TICKET_CLOSED,
            )
            .with_attachment(transcript_path.clone()),
        )
        .await;

        let dm = format!("Here is the transcript for ticket {ticket_id}.");
        if let Err(error) =
            self.platform.send_direct_message(closer, &dm, Some(&transcript_path)).await
        {
            warn!(
                event_name = "ticket.close.dm_failed",
                channel_id = %channel_id,
                ticket_id = %ticket_id,
                error = %error,
                "transcript DM was not delivered"
            );
            self.emit_log(
                AuditLogEntry::new(
                    format!("Transcript delivery failed for ticket {ticket_id}"),
                    format!("Could not DM the transcript to <@{closer}>."),
                    COLOR_NOTICE,
                ),
            )
            .await;
        }

        self.platform.delete_channel(channel_id).await?;
        self.store.remove_ticket(channel_id).await?;

        info!(
            event_name = "ticket.close.ok",
            channel_id = %channel_id,
            ticket_id = %ticket_id,
            closer = %closer,
            "ticket closed"
        );

        Ok(ClosedTicket { ticket_id, transcript_path })
    }

    /// Grants `user` read and send visibility on a ticket channel. Channel
    /// permission state is not mirrored into the store; the platform stays
    /// the sole authority for it.
    pub async fn add_user(&self, channel_id: ChannelId, user: UserId) -> Result<(), RegistryError> {
        if !self.store.is_ticket(channel_id).await? {
            return Err(RegistryError::NotATicket(channel_id));
        }
        self.platform.set_member_visibility(channel_id, user, true, true).await?;
        Ok(())
    }

    pub async fn remove_user(
        &self,
        channel_id: ChannelId,
        user: UserId,
    ) -> Result<(), RegistryError> {
        if !self.store.is_ticket(channel_id).await? {
            return Err(RegistryError::NotATicket(channel_id));
        }
        self.platform.set_member_visibility(channel_id, user, false, false).await?;
        Ok(())
    }

    /// Posts a fresh intake trigger message and records it as the one live
    /// setup message. Each call abandons the previous message; the old one
    /// stays in the channel but no longer opens tickets.
    pub async fn setup_intake_message(&self) -> Result<MessageId, RegistryError> {
        let channel = self.settings.intake_channel_id;
        let message_id = self.platform.send_message(channel, INTAKE_MESSAGE).await?;
        self.platform.add_reaction(channel, message_id, ReactionSymbol::Confirm).await?;
        self.store.save_setup_message(message_id).await?;

        info!(
            event_name = "ticket.setup.ok",
            channel_id = %channel,
            message_id = %message_id,
            "intake trigger message replaced"
        );

        Ok(message_id)
    }

    async fn emit_log(&self, entry: AuditLogEntry) {
        if let Err(error) = self.log.emit(entry).await {
            warn!(
                event_name = "ticket.audit.emit_failed",
                error = %error,
                "audit log delivery failed"
            );
        }
    }
}

const INTAKE_MESSAGE: &str = "**Our Services**\nTo purchase a service or enquire about one you must react with a tick to this message.";

fn welcome_message(member: &Member, staff_role: RoleId) -> String {
    format!(
        "<@{}> | <@&{}>\n** Hello {} **\n\nThis is your ticket, how can we help you?\n\n`Our team will be with you shortly.`",
        member.id, staff_role, member.display_name
    )
}

fn subject_message(subject: &str) -> String {
    format!("**Subject**\n{subject}")
}

fn creation_log_body(member: &Member, channel_id: ChannelId, subject: Option<&str>) -> String {
    format!(
        "Ticket Creator: <@{}> (`{}`)\nChannel: <#{}>\nSubject: {}",
        member.id,
        member.id,
        channel_id,
        subject.unwrap_or("Not set.")
    )
}

fn close_log_body(reason: Option<&str>) -> String {
    format!("Close Reason: {}", reason.unwrap_or("No closing reason specified."))
}
