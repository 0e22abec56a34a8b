//! Shared type definitions: typed identifiers and scope keys.

pub mod id;
pub mod scope;

pub use id::{
    ActivityId, EventId, MessageId, NotificationId, ParticipantId, SessionId, WorkspaceId,
};
pub use scope::ScopeKey;
