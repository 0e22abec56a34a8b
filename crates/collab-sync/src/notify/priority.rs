//! Priority and wording rules for activity-derived notifications.

use collab_entity::activity::{ActivityEvent, event_types};
use collab_entity::notification::NotificationPriority;

/// Classify an activity event into a notification headline, body, and
/// priority.
pub fn classify(event: &ActivityEvent) -> (NotificationPriority, String, String) {
    match event.event_type.as_str() {
        event_types::IDEA_SUBMITTED => (
            NotificationPriority::Medium,
            "New idea submitted".to_string(),
            format!("A new idea was submitted to {}", event.entity_id),
        ),
        event_types::COMMENT_CREATED => (
            NotificationPriority::Low,
            "New comment".to_string(),
            format!("New comment on {} {}", event.entity_type, event.entity_id),
        ),
        event_types::EVENT_REGISTRATION => (
            NotificationPriority::Low,
            "New event registration".to_string(),
            format!("A participant registered for event {}", event.entity_id),
        ),
        event_types::CHALLENGE_PUBLISHED => (
            NotificationPriority::High,
            "Challenge published".to_string(),
            format!("Challenge {} is now open for ideas", event.entity_id),
        ),
        event_types::PARTNER_JOINED => (
            NotificationPriority::Medium,
            "New partner".to_string(),
            format!("Partner {} joined the workspace", event.entity_id),
        ),
        event_types::SYSTEM_ANNOUNCEMENT => (
            NotificationPriority::Urgent,
            "Announcement".to_string(),
            event
                .metadata
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("A portal announcement was published")
                .to_string(),
        ),
        other => (
            NotificationPriority::Medium,
            "Workspace activity".to_string(),
            format!("{other} on {} {}", event.entity_type, event.entity_id),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use collab_core::types::{ActivityId, ParticipantId, WorkspaceId};
    use serde_json::Map;

    fn event(event_type: &str) -> ActivityEvent {
        ActivityEvent {
            id: ActivityId::new(),
            scope_id: WorkspaceId::new(),
            actor_id: ParticipantId::new(),
            event_type: event_type.to_string(),
            entity_type: "challenge".to_string(),
            entity_id: "c-42".to_string(),
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_announcements_are_urgent() {
        let (priority, _, _) = classify(&event(event_types::SYSTEM_ANNOUNCEMENT));
        assert_eq!(priority, NotificationPriority::Urgent);
    }

    #[test]
    fn test_unknown_types_default_to_medium() {
        let (priority, title, _) = classify(&event("something.else"));
        assert_eq!(priority, NotificationPriority::Medium);
        assert_eq!(title, "Workspace activity");
    }
}
