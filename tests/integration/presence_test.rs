//! Integration tests for presence tracking.

use std::time::Duration;

use collab_core::types::{ParticipantId, ScopeKey, SessionId, WorkspaceId};
use collab_entity::presence::{PresenceRecord, PresenceStatus};
use collab_sync::Visibility;

use crate::helpers::{SETTLE, TestHarness, wait_for};

#[tokio::test]
async fn test_peer_presence_visible_after_track() {
    let harness = TestHarness::new();
    let scope = ScopeKey::workspace(WorkspaceId::new());
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    // Bob observes the scope through his own client.
    let bob_ctx = harness.peer();
    let bob_view = bob_ctx.presence().scope(&scope);

    // Alice tracks through a separate client.
    let alice_record = PresenceRecord::online(alice, SessionId::new(), "ideas board");
    harness.ctx.presence().track(&scope, &alice_record).await.unwrap();

    let settled = wait_for(
        || {
            bob_view
                .online_participants()
                .iter()
                .any(|r| r.participant_id == alice)
        },
        SETTLE,
    )
    .await;
    assert!(settled, "bob never saw alice online");
    assert!(!bob_view
        .online_participants()
        .iter()
        .any(|r| r.participant_id == bob));
}

#[tokio::test]
async fn test_silent_disconnect_goes_stale() {
    let harness = TestHarness::new(); // stale_after = 1s
    let scope = ScopeKey::workspace(WorkspaceId::new());
    let alice = ParticipantId::new();

    let bob_ctx = harness.peer();
    let bob_view = bob_ctx.presence().scope(&scope);

    // Alice tracks once, then disconnects without an explicit leave
    // (her client never heartbeats again).
    let record = PresenceRecord::online(alice, SessionId::new(), "dashboard");
    harness.ctx.presence().track(&scope, &record).await.unwrap();

    let seen = wait_for(
        || {
            bob_view
                .online_participants()
                .iter()
                .any(|r| r.participant_id == alice)
        },
        SETTLE,
    )
    .await;
    assert!(seen, "alice never appeared");

    // After the staleness window, alice no longer counts as online even
    // though no leave event ever arrived.
    let gone = wait_for(
        || !bob_view
            .online_participants()
            .iter()
            .any(|r| r.participant_id == alice),
        Duration::from_secs(3),
    )
    .await;
    assert!(gone, "stale presence still reported online");

    // The raw snapshot keeps her around for UI continuity.
    assert!(bob_view
        .snapshot()
        .iter()
        .any(|r| r.participant_id == alice));
}

#[tokio::test]
async fn test_explicit_leave_removes_participant() {
    let harness = TestHarness::new();
    let scope = ScopeKey::workspace(WorkspaceId::new());
    let alice = ParticipantId::new();

    let bob_ctx = harness.peer();
    let bob_view = bob_ctx.presence().scope(&scope);

    let alice_view = harness.ctx.presence().scope(&scope);
    let record = PresenceRecord::online(alice, SessionId::new(), "dashboard");
    alice_view.track(&record).await.unwrap();

    assert!(
        wait_for(
            || bob_view.snapshot().iter().any(|r| r.participant_id == alice),
            SETTLE
        )
        .await
    );

    alice_view.untrack().await.unwrap();
    let gone = wait_for(
        || !bob_view.snapshot().iter().any(|r| r.participant_id == alice),
        SETTLE,
    )
    .await;
    assert!(gone, "leave event never removed alice");
}

#[tokio::test]
async fn test_heartbeat_keeps_record_fresh_and_tracks_visibility() {
    let harness = TestHarness::new(); // heartbeat 1s, stale 1s
    let scope = ScopeKey::workspace(WorkspaceId::new());
    let me = ParticipantId::new();

    let record = PresenceRecord::online(me, SessionId::new(), "dashboard");
    let heartbeat = harness.ctx.heartbeat(&scope, record);
    let view = harness.ctx.presence().scope(&scope);

    assert!(
        wait_for(
            || view.online_participants().iter().any(|r| r.participant_id == me),
            SETTLE
        )
        .await
    );

    // Still online after multiple staleness windows thanks to re-tracks.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(view
        .online_participants()
        .iter()
        .any(|r| r.participant_id == me));

    // Backgrounding degrades the published status to away.
    heartbeat.set_visibility(Visibility::Background);
    let away = wait_for(
        || {
            view.snapshot()
                .iter()
                .any(|r| r.participant_id == me && r.status == PresenceStatus::Away)
        },
        SETTLE,
    )
    .await;
    assert!(away, "visibility change never published");

    heartbeat.stop();
}
