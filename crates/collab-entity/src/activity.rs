//! Workspace activity events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use collab_core::types::{ActivityId, ParticipantId, WorkspaceId};

/// One append-only activity record produced by the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Unique event id.
    pub id: ActivityId,
    /// Workspace the event belongs to.
    pub scope_id: WorkspaceId,
    /// Participant who caused the event.
    pub actor_id: ParticipantId,
    /// Dotted event type, e.g. `idea.submitted`.
    pub event_type: String,
    /// Kind of entity the event refers to.
    pub entity_type: String,
    /// Identifier of the referenced entity.
    pub entity_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Opaque extra payload.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Well-known activity event types emitted by the portal.
pub mod event_types {
    /// An idea was submitted to a challenge.
    pub const IDEA_SUBMITTED: &str = "idea.submitted";
    /// A comment was posted.
    pub const COMMENT_CREATED: &str = "comment.created";
    /// A participant registered for an event.
    pub const EVENT_REGISTRATION: &str = "event.registration";
    /// A challenge was published.
    pub const CHALLENGE_PUBLISHED: &str = "challenge.published";
    /// A partner organisation joined.
    pub const PARTNER_JOINED: &str = "partner.joined";
    /// A portal-wide announcement.
    pub const SYSTEM_ANNOUNCEMENT: &str = "system.announcement";
}
