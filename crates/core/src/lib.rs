pub mod audit;
pub mod config;
pub mod domain;
pub mod platform;
pub mod registry;
pub mod session;
pub mod store;
pub mod transcript;

pub use audit::{AuditLogEntry, InMemoryLogSink, LogSink};
pub use domain::ids::{ChannelId, GuildId, MessageId, RoleId, TicketId, UserId};
pub use domain::reaction::ReactionSymbol;
pub use domain::ticket::TicketRecord;
pub use platform::{
    ChannelMessage, ChatPlatform, CreateChannelRequest, Grantee, InMemoryPlatform, Member,
    PlatformError, VisibilityRule,
};
pub use registry::{
    ClosedTicket, CreatedTicket, RegistryError, RegistrySettings, TicketRegistry,
};
pub use session::{Session, SessionContext, SessionOrigin};
pub use store::{InMemoryTicketStore, StoreError, TicketStore};
pub use transcript::TranscriptWriter;
