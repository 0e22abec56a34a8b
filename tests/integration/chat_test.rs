//! Integration tests for the chat unit.

use collab_core::types::ParticipantId;
use collab_entity::chat::MessageKind;

use crate::helpers::{SETTLE, TestHarness, wait_for};

#[tokio::test]
async fn test_message_flows_between_clients() {
    let harness = TestHarness::new();
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    let alice_chat = harness.ctx.chat("general", alice).await.unwrap();
    let bob_ctx = harness.peer();
    let bob_chat = bob_ctx.chat("general", bob).await.unwrap();

    alice_chat
        .send("hello from alice", MessageKind::Text, None)
        .await
        .unwrap();

    let settled = wait_for(
        || {
            bob_chat
                .visible_messages()
                .iter()
                .any(|m| m.content == "hello from alice" && m.sender_id == alice)
        },
        SETTLE,
    )
    .await;
    assert!(settled, "bob never received alice's message");
}

#[tokio::test]
async fn test_reattach_reconciles_without_duplicates() {
    let harness = TestHarness::new();
    let alice = ParticipantId::new();
    let bob = ParticipantId::new();

    let alice_chat = harness.ctx.chat("standup", alice).await.unwrap();

    // Bob attaches, then detaches before any traffic.
    let bob_ctx = harness.peer();
    let bob_chat = bob_ctx.chat("standup", bob).await.unwrap();
    drop(bob_chat);

    // Insert arrives while bob has no active listener.
    alice_chat
        .send("missed while away", MessageKind::Text, None)
        .await
        .unwrap();

    // Re-attachment reconciles via full refresh.
    let bob_chat = bob_ctx.chat("standup", bob).await.unwrap();
    let settled = wait_for(|| bob_chat.visible_messages().len() == 1, SETTLE).await;
    assert!(settled, "refresh did not reconcile the missed message");

    // A live insert afterwards must not duplicate anything.
    alice_chat
        .send("back online", MessageKind::Text, None)
        .await
        .unwrap();
    let settled = wait_for(|| bob_chat.visible_messages().len() == 2, SETTLE).await;
    assert!(settled);

    let messages = bob_chat.visible_messages();
    let mut ids: Vec<_> = messages.iter().map(|m| m.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), messages.len(), "duplicate message ids in cache");
}

#[tokio::test]
async fn test_edit_and_soft_delete() {
    let harness = TestHarness::new();
    let alice = ParticipantId::new();
    let chat = harness.ctx.chat("general", alice).await.unwrap();

    let message = chat.send("draft", MessageKind::Text, None).await.unwrap();
    assert!(wait_for(|| chat.visible_messages().len() == 1, SETTLE).await);

    chat.edit(message.id, "final wording").await.unwrap();
    let settled = wait_for(
        || {
            chat.visible_messages()
                .first()
                .is_some_and(|m| m.content == "final wording" && m.edited_at.is_some())
        },
        SETTLE,
    )
    .await;
    assert!(settled, "edit never reconciled");

    chat.remove(message.id).await.unwrap();
    let settled = wait_for(|| chat.visible_messages().is_empty(), SETTLE).await;
    assert!(settled, "soft delete never hid the message");

    // The cache view retains the record with its delete flag.
    let state = chat.state();
    assert_eq!(state.data.len(), 1);
    assert!(state.data[0].deleted);
}

#[tokio::test]
async fn test_send_failure_reverts_and_surfaces_error() {
    let harness = TestHarness::new();
    let chat = harness
        .ctx
        .chat("general", ParticipantId::new())
        .await
        .unwrap();

    harness.store.set_fail_writes(true);
    let err = chat
        .send("doomed", MessageKind::Text, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, collab_core::error::ErrorKind::Store);

    let state = chat.state();
    assert!(!state.loading);
    assert!(state.error.is_some());
    assert!(state.data.is_empty(), "failed send must not linger locally");
}
