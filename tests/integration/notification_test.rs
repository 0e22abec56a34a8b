//! Integration tests for the notification aggregator.

use std::time::Duration;

use chrono::Utc;
use serde_json::Map;

use collab_core::traits::store::RecordStore;
use collab_core::types::{ActivityId, ParticipantId, WorkspaceId};
use collab_entity::activity::{ActivityEvent, event_types};
use collab_entity::notification::NotificationPriority;
use collab_entity::tables;

use crate::helpers::{SETTLE, TestHarness, fast_config, wait_for};

async fn insert_activity(
    harness: &TestHarness,
    workspace: WorkspaceId,
    actor: ParticipantId,
    event_type: &str,
) {
    let event = ActivityEvent {
        id: ActivityId::new(),
        scope_id: workspace,
        actor_id: actor,
        event_type: event_type.to_string(),
        entity_type: "challenge".to_string(),
        entity_id: "c-1".to_string(),
        created_at: Utc::now(),
        metadata: Map::new(),
    };
    harness
        .store
        .insert(tables::ACTIVITIES, serde_json::to_value(&event).unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_activity_becomes_prioritized_notification() {
    let harness = TestHarness::new();
    let workspace = WorkspaceId::new();
    let bob = ParticipantId::new();
    let alice = ParticipantId::new();

    let inbox = harness.ctx.notifications(bob, workspace).await.unwrap();

    insert_activity(&harness, workspace, alice, event_types::CHALLENGE_PUBLISHED).await;

    let settled = wait_for(|| inbox.list().len() == 1, SETTLE).await;
    assert!(settled, "activity never became a notification");

    let notification = &inbox.list()[0];
    assert_eq!(notification.priority, NotificationPriority::High);
    assert_eq!(notification.kind, event_types::CHALLENGE_PUBLISHED);
    assert_eq!(notification.recipient_id, bob);
    assert_eq!(inbox.unread_count(), 1);
}

#[tokio::test]
async fn test_own_activity_is_not_notified() {
    let harness = TestHarness::new();
    let workspace = WorkspaceId::new();
    let bob = ParticipantId::new();

    let inbox = harness.ctx.notifications(bob, workspace).await.unwrap();

    insert_activity(&harness, workspace, bob, event_types::IDEA_SUBMITTED).await;
    let alice = ParticipantId::new();
    insert_activity(&harness, workspace, alice, event_types::IDEA_SUBMITTED).await;

    let settled = wait_for(|| inbox.list().len() == 1, SETTLE).await;
    assert!(settled);
    assert_eq!(inbox.list()[0].kind, event_types::IDEA_SUBMITTED);
}

#[tokio::test]
async fn test_read_lifecycle() {
    let harness = TestHarness::new();
    let workspace = WorkspaceId::new();
    let bob = ParticipantId::new();
    let alice = ParticipantId::new();

    let inbox = harness.ctx.notifications(bob, workspace).await.unwrap();
    insert_activity(&harness, workspace, alice, event_types::COMMENT_CREATED).await;
    insert_activity(&harness, workspace, alice, event_types::PARTNER_JOINED).await;

    assert!(wait_for(|| inbox.list().len() == 2, SETTLE).await);
    assert_eq!(inbox.unread_count(), 2);

    inbox.mark_all_read();
    assert_eq!(inbox.unread_count(), 0);
    assert_eq!(inbox.list().len(), 2, "read notifications stay listed");
}

#[tokio::test]
async fn test_dwell_policy_auto_marks_read() {
    let mut config = fast_config();
    config.notifications.auto_mark_read_after_seconds = Some(1);
    let harness = TestHarness::with_config(config);

    let workspace = WorkspaceId::new();
    let bob = ParticipantId::new();
    let alice = ParticipantId::new();

    let inbox = harness.ctx.notifications(bob, workspace).await.unwrap();
    insert_activity(&harness, workspace, alice, event_types::COMMENT_CREATED).await;

    assert!(wait_for(|| inbox.unread_count() == 1, SETTLE).await);

    // With no archive/clear action, the dwell timer marks it read.
    let auto_read = wait_for(|| inbox.unread_count() == 0, Duration::from_secs(3)).await;
    assert!(auto_read, "dwell policy never fired");
    assert_eq!(inbox.list().len(), 1);
}
