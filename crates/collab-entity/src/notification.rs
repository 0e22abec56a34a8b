//! Typed notifications derived from activity events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use collab_core::types::{NotificationId, ParticipantId};

/// Notification priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Background events.
    Low,
    /// Standard events.
    Medium,
    /// Important events.
    High,
    /// Requires immediate attention.
    Urgent,
}

impl NotificationPriority {
    /// Parse from string with a default fallback.
    pub fn from_str_value(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Medium,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// One inbox notification.
///
/// Lifecycle is monotonic: once archived a notification stays archived,
/// and `read_at` never changes after it is first set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification id.
    pub id: NotificationId,
    /// Recipient participant.
    pub recipient_id: ParticipantId,
    /// Dotted source event type, e.g. `comment.created`.
    pub kind: String,
    /// Short headline.
    pub title: String,
    /// Longer body text.
    pub message: String,
    /// `entity_type:entity_id` reference into the portal.
    pub related_entity: String,
    /// Priority level.
    pub priority: NotificationPriority,
    /// Whether the recipient has read it.
    pub is_read: bool,
    /// Whether the recipient has archived it.
    pub is_archived: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Set once, when first marked read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}
