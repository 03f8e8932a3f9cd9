use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use crate::domain::reaction::ReactionSymbol;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),
    #[error("unknown member {0}")]
    UnknownMember(UserId),
    #[error("platform request failed: {0}")]
    Request(String),
}

/// A resolved guild member. The create-ticket precondition is that the
/// requester resolves to one of these; the registry never works with a bare
/// user id it has not resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
}

/// One message of a channel's history, as returned by
/// [`ChatPlatform::channel_history`] (oldest first).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub author: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grantee {
    Everyone,
    Member(UserId),
    Role(RoleId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibilityRule {
    pub grantee: Grantee,
    pub read: bool,
    pub write: bool,
}

impl VisibilityRule {
    pub fn visible(grantee: Grantee) -> Self {
        Self { grantee, read: true, write: true }
    }

    pub fn hidden(grantee: Grantee) -> Self {
        Self { grantee, read: false, write: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateChannelRequest {
    pub name: String,
    pub parent_category: Option<ChannelId>,
    pub visibility: Vec<VisibilityRule>,
}

/// Narrow surface of the host chat platform the registry and gateway
/// handlers call. The wire protocol behind it is out of scope; implementors
/// range from the in-memory double below to a real client.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn create_channel(
        &self,
        guild: GuildId,
        request: CreateChannelRequest,
    ) -> Result<ChannelId, PlatformError>;

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, PlatformError>;

    /// Full message history of a channel, oldest first. Finite and
    /// restartable per call.
    async fn channel_history(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<ChannelMessage>, PlatformError>;

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError>;

    async fn set_member_visibility(
        &self,
        channel: ChannelId,
        member: UserId,
        read: bool,
        write: bool,
    ) -> Result<(), PlatformError>;

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        symbol: ReactionSymbol,
    ) -> Result<(), PlatformError>;

    /// Removes `member`'s reaction. Passing the bot's own id removes the
    /// bot's reaction.
    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        symbol: ReactionSymbol,
        member: UserId,
    ) -> Result<(), PlatformError>;

    async fn resolve_member(&self, guild: GuildId, user: UserId)
        -> Result<Member, PlatformError>;

    async fn send_direct_message(
        &self,
        user: UserId,
        content: &str,
        attachment: Option<&Path>,
    ) -> Result<(), PlatformError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedChannel {
    pub id: ChannelId,
    pub guild: GuildId,
    pub request: CreateChannelRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub id: MessageId,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionChange {
    pub channel: ChannelId,
    pub message: MessageId,
    pub symbol: ReactionSymbol,
    /// The member whose reaction was removed; `None` for additions (the bot
    /// always adds its own).
    pub member: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityChange {
    pub channel: ChannelId,
    pub member: UserId,
    pub read: bool,
    pub write: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectMessage {
    pub user: UserId,
    pub content: String,
    pub attachment: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct PlatformState {
    next_channel: i64,
    next_message: i64,
    channels: Vec<CreatedChannel>,
    messages: Vec<SentMessage>,
    histories: HashMap<ChannelId, Vec<ChannelMessage>>,
    deleted: Vec<ChannelId>,
    reactions_added: Vec<ReactionChange>,
    reactions_removed: Vec<ReactionChange>,
    visibility_changes: Vec<VisibilityChange>,
    direct_messages: Vec<DirectMessage>,
    member_names: HashMap<UserId, String>,
    fail_direct_messages: bool,
    fail_channel_deletion: bool,
}

/// Recording fake of the chat platform. Allocates channel and message ids,
/// keeps per-channel histories (messages the bot sends are appended, so a
/// later transcript sees them), and exposes everything it was asked to do.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn member_named(&self, user: UserId, display_name: impl Into<String>) {
        self.state().member_names.insert(user, display_name.into());
    }

    pub fn seed_history(&self, channel: ChannelId, messages: Vec<ChannelMessage>) {
        self.state().histories.insert(channel, messages);
    }

    pub fn refuse_direct_messages(&self) {
        self.state().fail_direct_messages = true;
    }

    pub fn refuse_channel_deletion(&self) {
        self.state().fail_channel_deletion = true;
    }

    pub fn created_channels(&self) -> Vec<CreatedChannel> {
        self.state().channels.clone()
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state().messages.clone()
    }

    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.state().deleted.clone()
    }

    pub fn reactions_added(&self) -> Vec<ReactionChange> {
        self.state().reactions_added.clone()
    }

    pub fn reactions_removed(&self) -> Vec<ReactionChange> {
        self.state().reactions_removed.clone()
    }

    pub fn visibility_changes(&self) -> Vec<VisibilityChange> {
        self.state().visibility_changes.clone()
    }

    pub fn direct_messages(&self) -> Vec<DirectMessage> {
        self.state().direct_messages.clone()
    }
}

#[async_trait]
impl ChatPlatform for InMemoryPlatform {
    async fn create_channel(
        &self,
        guild: GuildId,
        request: CreateChannelRequest,
    ) -> Result<ChannelId, PlatformError> {
        let mut state = self.state();
        state.next_channel += 1;
        let id = ChannelId(1000 + state.next_channel);
        state.channels.push(CreatedChannel { id, guild, request });
        state.histories.entry(id).or_default();
        Ok(id)
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageId, PlatformError> {
        let mut state = self.state();
        state.next_message += 1;
        let id = MessageId(9000 + state.next_message);
        state.messages.push(SentMessage { channel, id, content: content.to_string() });
        state.histories.entry(channel).or_default().push(ChannelMessage {
            author: "ticketry".to_string(),
            content: content.to_string(),
            sent_at: Utc::now(),
        });
        Ok(id)
    }

    async fn channel_history(
        &self,
        channel: ChannelId,
    ) -> Result<Vec<ChannelMessage>, PlatformError> {
        self.state()
            .histories
            .get(&channel)
            .cloned()
            .ok_or(PlatformError::UnknownChannel(channel))
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        let mut state = self.state();
        if state.fail_channel_deletion {
            return Err(PlatformError::Request("channel deletion refused".to_string()));
        }
        state.deleted.push(channel);
        Ok(())
    }

    async fn set_member_visibility(
        &self,
        channel: ChannelId,
        member: UserId,
        read: bool,
        write: bool,
    ) -> Result<(), PlatformError> {
        self.state().visibility_changes.push(VisibilityChange { channel, member, read, write });
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        symbol: ReactionSymbol,
    ) -> Result<(), PlatformError> {
        self.state().reactions_added.push(ReactionChange {
            channel,
            message,
            symbol,
            member: None,
        });
        Ok(())
    }

    async fn remove_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        symbol: ReactionSymbol,
        member: UserId,
    ) -> Result<(), PlatformError> {
        self.state().reactions_removed.push(ReactionChange {
            channel,
            message,
            symbol,
            member: Some(member),
        });
        Ok(())
    }

    async fn resolve_member(
        &self,
        _guild: GuildId,
        user: UserId,
    ) -> Result<Member, PlatformError> {
        let name = self
            .state()
            .member_names
            .get(&user)
            .cloned()
            .unwrap_or_else(|| format!("user-{}", user.0));
        Ok(Member { id: user, display_name: name })
    }

    async fn send_direct_message(
        &self,
        user: UserId,
        content: &str,
        attachment: Option<&Path>,
    ) -> Result<(), PlatformError> {
        let mut state = self.state();
        if state.fail_direct_messages {
            return Err(PlatformError::Request("direct message delivery refused".to_string()));
        }
        state.direct_messages.push(DirectMessage {
            user,
            content: content.to_string(),
            attachment: attachment.map(Path::to_path_buf),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::ids::{ChannelId, GuildId, UserId};
    use crate::domain::reaction::ReactionSymbol;

    use super::{ChatPlatform, CreateChannelRequest, Grantee, InMemoryPlatform, VisibilityRule};

    #[tokio::test]
    async fn sent_messages_become_part_of_channel_history() {
        let platform = InMemoryPlatform::new();
        let channel = platform
            .create_channel(
                GuildId(1),
                CreateChannelRequest {
                    name: "Support Ticket #1".to_string(),
                    parent_category: None,
                    visibility: vec![VisibilityRule::hidden(Grantee::Everyone)],
                },
            )
            .await
            .expect("create channel");

        platform.send_message(channel, "hello").await.expect("send");
        let history = platform.channel_history(channel).await.expect("history");

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[0].author, "ticketry");
    }

    #[tokio::test]
    async fn history_of_unknown_channel_is_an_error() {
        let platform = InMemoryPlatform::new();
        assert!(platform.channel_history(ChannelId(404)).await.is_err());
    }

    #[tokio::test]
    async fn refused_direct_messages_surface_as_errors() {
        let platform = InMemoryPlatform::new();
        platform.refuse_direct_messages();

        let result = platform.send_direct_message(UserId(9), "transcript", None).await;
        assert!(result.is_err());
        assert!(platform.direct_messages().is_empty());
    }

    #[tokio::test]
    async fn reactions_record_symbol_and_member() {
        let platform = InMemoryPlatform::new();
        let channel = ChannelId(1001);

        platform
            .add_reaction(channel, crate::domain::ids::MessageId(555), ReactionSymbol::Lock)
            .await
            .expect("add");
        platform
            .remove_reaction(
                channel,
                crate::domain::ids::MessageId(555),
                ReactionSymbol::Confirm,
                UserId(42),
            )
            .await
            .expect("remove");

        assert_eq!(platform.reactions_added()[0].symbol, ReactionSymbol::Lock);
        assert_eq!(platform.reactions_removed()[0].member, Some(UserId(42)));
    }
}
