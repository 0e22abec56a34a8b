//! Table names used by the backing store and the change feed.

/// Event registration records.
pub const EVENT_PARTICIPANTS: &str = "event_participants";

/// Chat messages.
pub const CHAT_MESSAGES: &str = "chat_messages";

/// Workspace activity events.
pub const ACTIVITIES: &str = "activities";
