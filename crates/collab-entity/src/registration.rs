//! Event registration records and the derived registration view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use collab_core::types::{EventId, ParticipantId};

/// Authoritative participation record stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventParticipation {
    /// Record id.
    pub id: Uuid,
    /// The event registered for.
    pub event_id: EventId,
    /// The registered participant.
    pub participant_id: ParticipantId,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
}

impl EventParticipation {
    /// Create a new participation record for insertion.
    pub fn new(event_id: EventId, participant_id: ParticipantId) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            participant_id,
            registered_at: Utc::now(),
        }
    }
}

/// Derived, non-authoritative registration view for one participant and
/// one event. Reconciled against the remote records on every refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationState {
    /// Whether the local participant holds a participation record.
    pub is_registered: bool,
    /// Total registered participants for the event.
    pub participant_count: usize,
    /// The local participant's record, when registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation: Option<EventParticipation>,
}
