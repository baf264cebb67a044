//! Exactly-once resolution under concurrent confirm/cancel/expire.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::Duration;
use futures::future::join_all;
use paysession_core::{ConfirmAction, PaymentError, PaymentSession, SessionStatus};
use paysession_testing::helpers::TestHarness;
use paysession_testing::properties::contending_actions;
use proptest::prelude::*;
use std::sync::Arc;

/// Outcome as seen by one caller: the status it observed and whether it won.
fn observed(result: Result<PaymentSession, PaymentError>) -> (SessionStatus, bool) {
    match result {
        Ok(session) => (session.status, true),
        Err(PaymentError::AlreadyProcessed { status, .. }) => (status, false),
        Err(other) => panic!("unexpected error: {other:?}"),
    }
}

async fn race(
    harness: &TestHarness,
    actions: &[ConfirmAction],
) -> (PaymentSession, Vec<(SessionStatus, bool)>) {
    let session = harness.create_default().await.unwrap();

    let handles = actions.iter().map(|&action| {
        let manager = Arc::clone(&harness.manager);
        tokio::spawn(async move { manager.confirm(session.id, action).await })
    });
    let results = join_all(handles)
        .await
        .into_iter()
        .map(|joined| observed(joined.unwrap()))
        .collect();

    (session, results)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn exactly_one_caller_wins(actions in contending_actions(16)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let harness = TestHarness::new();
            let (session, results) = race(&harness, &actions).await;

            let winners: Vec<_> = results.iter().filter(|(_, won)| *won).collect();
            prop_assert_eq!(winners.len(), 1);

            let final_status = winners[0].0;
            prop_assert!(results.iter().all(|(status, _)| *status == final_status));
            prop_assert_eq!(harness.store.applied_transitions(), 1);

            let stored = harness.store.snapshot(session.id).await.unwrap();
            prop_assert_eq!(stored.status, final_status);
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn confirm_and_cancel_race_has_one_winner() {
    for _ in 0..50 {
        let harness = TestHarness::new();
        let (_, results) = race(&harness, &[ConfirmAction::Confirm, ConfirmAction::Cancel]).await;

        let (a, a_won) = results[0];
        let (b, b_won) = results[1];
        assert_ne!(a_won, b_won, "exactly one of the two must win");
        assert_eq!(a, b);
        assert!(matches!(a, SessionStatus::Success | SessionStatus::Cancelled));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn expiry_racing_confirm_settles_on_one_status() {
    for _ in 0..50 {
        let harness = TestHarness::new();
        let session = harness.create_default().await.unwrap();
        harness.clock.set(session.expires_at + Duration::seconds(1));

        let reader = {
            let manager = Arc::clone(&harness.manager);
            tokio::spawn(async move { manager.get(session.id).await })
        };
        let confirmer = {
            let manager = Arc::clone(&harness.manager);
            tokio::spawn(async move { manager.confirm(session.id, ConfirmAction::Confirm).await })
        };

        let read = reader.await.unwrap().unwrap();
        let (confirmed_status, confirm_won) = observed(confirmer.await.unwrap());

        // Past the deadline a confirm can never win.
        assert!(!confirm_won);
        assert_eq!(read.status, SessionStatus::Expired);
        assert_eq!(confirmed_status, SessionStatus::Expired);
        assert_eq!(harness.store.applied_transitions(), 1);
    }
}

#[tokio::test]
async fn resolved_status_never_changes() {
    let harness = TestHarness::new();
    let session = harness.create_default().await.unwrap();
    harness
        .manager
        .confirm(session.id, ConfirmAction::Cancel)
        .await
        .unwrap();

    for step in 1..=5 {
        harness.clock.advance(Duration::minutes(step));
        let read = harness.manager.get(session.id).await.unwrap();
        assert_eq!(read.status, SessionStatus::Cancelled);
        let err = harness
            .manager
            .confirm(session.id, ConfirmAction::Confirm)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::AlreadyProcessed { status: SessionStatus::Cancelled, .. }
        ));
    }
}
