//! Presence record and status definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use collab_core::types::{ParticipantId, SessionId};

/// Participant presence status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// Participant is active in the portal.
    Online,
    /// Participant is connected but backgrounded or idle.
    Away,
    /// Participant asked not to be disturbed.
    Busy,
    /// Participant is not connected.
    Offline,
}

impl PresenceStatus {
    /// Parses from a string with a default fallback.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "online" => Self::Online,
            "away" => Self::Away,
            "busy" => Self::Busy,
            "offline" => Self::Offline,
            _ => Self::Online,
        }
    }

    /// Converts to string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

/// Ephemeral, heartbeat-refreshed record of one participant's presence
/// within a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    /// The participant this record belongs to.
    pub participant_id: ParticipantId,
    /// The client session that published the record.
    pub session_id: SessionId,
    /// Current status.
    pub status: PresenceStatus,
    /// Free-form scope descriptor (e.g. the page or board being viewed).
    pub location: String,
    /// Last heartbeat time.
    pub last_seen: DateTime<Utc>,
    /// Opaque per-client metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PresenceRecord {
    /// Create a fresh online record for a participant session.
    pub fn online(participant_id: ParticipantId, session_id: SessionId, location: &str) -> Self {
        Self {
            participant_id,
            session_id,
            status: PresenceStatus::Online,
            location: location.to_string(),
            last_seen: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Whether the record still counts as online: status says so and the
    /// last heartbeat is within the staleness window.
    pub fn is_online(&self, stale_after: Duration, now: DateTime<Utc>) -> bool {
        match self.status {
            PresenceStatus::Offline => false,
            _ => now - self.last_seen <= stale_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_record_is_not_online() {
        let mut record =
            PresenceRecord::online(ParticipantId::new(), SessionId::new(), "workspace");
        let now = Utc::now();
        record.last_seen = now - Duration::seconds(120);
        assert!(!record.is_online(Duration::seconds(45), now));
        record.last_seen = now - Duration::seconds(10);
        assert!(record.is_online(Duration::seconds(45), now));
    }

    #[test]
    fn test_status_parse_fallback() {
        assert_eq!(PresenceStatus::from_str_or_default("busy"), PresenceStatus::Busy);
        assert_eq!(
            PresenceStatus::from_str_or_default("unknown"),
            PresenceStatus::Online
        );
    }
}
