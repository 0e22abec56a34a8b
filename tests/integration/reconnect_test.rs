//! Integration tests for channel drop, reconnect, and terminal error
//! handling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use collab_core::types::{ParticipantId, ScopeKey};
use collab_entity::chat::MessageKind;
use collab_sync::ChannelStatus;

use crate::helpers::{SETTLE, TestHarness, wait_for};

#[tokio::test]
async fn test_reconnect_triggers_reconciling_refresh() {
    let harness = TestHarness::new();
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    let alice_chat = harness.ctx.chat("ops", alice).await.unwrap();
    let bob_ctx = harness.peer();
    let bob_chat = bob_ctx.chat("ops", bob).await.unwrap();

    let scope = ScopeKey::chat("ops");

    // Drop every connection; make the first retry fail so a message can
    // land while bob's client is offline.
    harness.hub.set_connect_failures(2);
    harness.hub.silent_drop(&scope).await;

    alice_chat
        .send("sent during the outage", MessageKind::Text, None)
        .await
        .unwrap();

    // The missed insert is not replayed; the post-reconnect refresh
    // must reconcile it.
    let settled = wait_for(
        || {
            bob_chat
                .visible_messages()
                .iter()
                .any(|m| m.content == "sent during the outage")
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(settled, "reconnect refresh never reconciled the outage");

    let messages = bob_chat.visible_messages();
    assert_eq!(messages.len(), 1, "no duplicates after reconcile");
}

#[tokio::test]
async fn test_exhausted_backoff_is_terminal_error() {
    let harness = TestHarness::new(); // 3 attempts, 10ms base
    let scope = ScopeKey::chat("doomed");

    let _chat = harness
        .ctx
        .chat("doomed", ParticipantId::new())
        .await
        .unwrap();

    let guard = harness.ctx.registry().open(&scope);
    let saw_reconnecting = Arc::new(AtomicBool::new(false));
    let saw = saw_reconnecting.clone();
    let _status_sub = guard.session().subscribe_status(move |status| {
        if *status == ChannelStatus::Reconnecting {
            saw.store(true, Ordering::SeqCst);
        }
    });

    harness.hub.set_connect_failures(u32::MAX);
    harness.hub.silent_drop(&scope).await;

    let errored = wait_for(
        || guard.session().status() == ChannelStatus::Error,
        Duration::from_secs(5),
    )
    .await;
    assert!(errored, "channel never reached terminal error state");
    assert!(
        saw_reconnecting.load(Ordering::SeqCst),
        "consumers must observe the reconnecting phase first"
    );
}

#[tokio::test]
async fn test_presence_retracked_after_reconnect() {
    let harness = TestHarness::new();
    let scope = ScopeKey::from("workspace:retrack");
    let alice = ParticipantId::new();

    let bob_ctx = harness.peer();
    let bob_view = bob_ctx.presence().scope(&scope);

    let alice_view = harness.ctx.presence().scope(&scope);
    let record = collab_entity::presence::PresenceRecord::online(
        alice,
        collab_core::types::SessionId::new(),
        "board",
    );
    alice_view.track(&record).await.unwrap();

    assert!(
        wait_for(
            || bob_view.snapshot().iter().any(|r| r.participant_id == alice),
            SETTLE
        )
        .await
    );

    // Bob only receives presence events when someone tracks; count the
    // emissions that arrive after the drop.
    let post_drop_events = Arc::new(AtomicBool::new(false));
    let flag = post_drop_events.clone();
    let _sub = bob_view.subscribe(move |records| {
        if records.iter().any(|r| r.status == collab_entity::presence::PresenceStatus::Online) {
            flag.store(true, Ordering::SeqCst);
        }
    });

    // Alice's connection drops silently; her session reconnects and
    // re-tracks the stored record without any caller involvement.
    harness
        .hub
        .silent_drop_participant(&scope, &alice.to_string())
        .await;

    let retracked = wait_for(
        || {
            post_drop_events.load(Ordering::SeqCst)
                && bob_view
                    .snapshot()
                    .iter()
                    .any(|r| r.participant_id == alice)
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(retracked, "presence was not re-tracked after reconnect");
}
