//! Chat message records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use collab_core::types::{MessageId, ParticipantId};

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// File attachment reference.
    File,
    /// Image attachment reference.
    Image,
    /// System-generated message.
    System,
}

/// One chat message in a channel.
///
/// Messages are never hard-deleted from the local cache view; the
/// `deleted` flag hides them instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id (client-assigned on send).
    pub id: MessageId,
    /// Sending participant.
    pub sender_id: ParticipantId,
    /// Message body or attachment reference.
    pub content: String,
    /// Message kind.
    pub message_type: MessageKind,
    /// Channel name the message was posted to.
    pub channel: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set when the message was edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// Message this one replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
}

impl ChatMessage {
    /// Create a new text message for a channel.
    pub fn text(sender_id: ParticipantId, channel: &str, content: &str) -> Self {
        Self {
            id: MessageId::new(),
            sender_id,
            content: content.to_string(),
            message_type: MessageKind::Text,
            channel: channel.to_string(),
            created_at: Utc::now(),
            edited_at: None,
            reply_to: None,
            deleted: false,
        }
    }
}
