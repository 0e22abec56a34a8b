//! Integration tests for the event registration unit.

use std::time::Duration;

use collab_core::traits::store::{RecordFilter, RecordStore};
use collab_core::types::{EventId, ParticipantId};
use collab_entity::tables;

use crate::helpers::{SETTLE, TestHarness, wait_for};

#[tokio::test]
async fn test_register_reconciles_through_change_feed() {
    let harness = TestHarness::new();
    let event_id = EventId::new();
    let me = ParticipantId::new();

    let unit = harness.ctx.registration(event_id, me).await.unwrap();
    let initial = unit.state();
    assert!(!initial.data.is_registered);
    assert_eq!(initial.data.participant_count, 0);

    unit.register().await.unwrap();

    // The authoritative view arrives via the feed-triggered refresh.
    let settled = wait_for(
        || {
            let state = unit.state();
            state.data.is_registered && state.data.participant_count == 1
        },
        SETTLE,
    )
    .await;
    assert!(settled, "registration never reconciled");
    assert!(unit.state().data.participation.is_some());
}

#[tokio::test]
async fn test_double_register_produces_single_insert() {
    let harness = TestHarness::new();
    let event_id = EventId::new();
    let me = ParticipantId::new();

    let unit = harness.ctx.registration(event_id, me).await.unwrap();
    let (a, b) = tokio::join!(unit.register(), unit.register());
    a.unwrap();
    b.unwrap();

    let settled = wait_for(|| unit.state().data.participant_count == 1, SETTLE).await;
    assert!(settled, "count never settled");

    let rows = harness
        .store
        .select(
            tables::EVENT_PARTICIPANTS,
            &RecordFilter::new().eq("event_id", event_id.to_string()),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "exactly one remote insert expected");
}

#[tokio::test]
async fn test_mutation_failure_reverts_and_surfaces_error() {
    let harness = TestHarness::new();
    let unit = harness
        .ctx
        .registration(EventId::new(), ParticipantId::new())
        .await
        .unwrap();

    harness.store.set_fail_writes(true);
    let err = unit.register().await.unwrap_err();
    assert_eq!(err.kind, collab_core::error::ErrorKind::Store);

    let state = unit.state();
    assert!(!state.loading, "loading flag must be reverted");
    assert!(state.error.is_some(), "error must be surfaced");
    assert!(!state.data.is_registered, "data must be unchanged");

    // A user-initiated retry succeeds once the store recovers.
    harness.store.set_fail_writes(false);
    unit.register().await.unwrap();
    let settled = wait_for(|| unit.state().data.is_registered, SETTLE).await;
    assert!(settled);
}

#[tokio::test]
async fn test_concurrent_refreshes_issue_one_fetch() {
    let harness = TestHarness::new();
    let unit = harness
        .ctx
        .registration(EventId::new(), ParticipantId::new())
        .await
        .unwrap();

    let before = harness.ctx.metrics();
    let (a, b) = tokio::join!(unit.refresh(false), unit.refresh(false));
    a.unwrap();
    b.unwrap();
    let after = harness.ctx.metrics();

    assert!(
        after.coalescer_misses - before.coalescer_misses <= 1,
        "same-tick refreshes must share at most one fetch"
    );
}

#[tokio::test]
async fn test_cancel_registration() {
    let harness = TestHarness::new();
    let unit = harness
        .ctx
        .registration(EventId::new(), ParticipantId::new())
        .await
        .unwrap();

    unit.register().await.unwrap();
    assert!(wait_for(|| unit.state().data.is_registered, SETTLE).await);

    unit.cancel().await.unwrap();
    let settled = wait_for(
        || {
            let state = unit.state();
            !state.data.is_registered && state.data.participant_count == 0
        },
        SETTLE,
    )
    .await;
    assert!(settled, "cancellation never reconciled");

    // Waiting a moment longer gives the unit time to drain any late
    // feed events before the final no-surprise check.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!unit.state().data.is_registered);
}
