//! Confirmation gateway behaviour as seen from the second device.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Duration;
use paysession_core::{ConfirmAction, ConfirmationGateway, HandoffLinkBuilder, PaymentError, SessionStatus};
use paysession_testing::helpers::TestHarness;

fn gateway(harness: &TestHarness) -> ConfirmationGateway {
    ConfirmationGateway::new(harness.manager.clone())
}

#[tokio::test]
async fn view_offers_actions_only_while_pending() {
    let harness = TestHarness::new();
    let gateway = gateway(&harness);
    let session = harness.create_default().await.unwrap();

    let view = gateway.view(&session.id.to_string()).await.unwrap();
    assert!(view.actions_available);
    assert_eq!(view.session.id, session.id);

    gateway
        .handle(&session.id.to_string(), ConfirmAction::Confirm)
        .await
        .unwrap();
    let view = gateway.view(&session.id.to_string()).await.unwrap();
    assert!(!view.actions_available);
    assert_eq!(view.session.status, SessionStatus::Success);
}

#[tokio::test]
async fn view_applies_lazy_expiry() {
    let harness = TestHarness::new();
    let gateway = gateway(&harness);
    let session = harness.create_default().await.unwrap();

    harness.clock.advance(Duration::minutes(6));
    let view = gateway.view(&session.id.to_string()).await.unwrap();
    assert_eq!(view.session.status, SessionStatus::Expired);
    assert!(!view.actions_available);
}

#[tokio::test]
async fn second_tap_reports_already_processed() {
    let harness = TestHarness::new();
    let gateway = gateway(&harness);
    let session = harness.create_default().await.unwrap();
    let raw = session.id.to_string();

    let first = gateway.handle(&raw, ConfirmAction::Confirm).await.unwrap();
    assert_eq!(first.status, SessionStatus::Success);
    assert!(!first.already_processed);

    let second = gateway.handle(&raw, ConfirmAction::Cancel).await.unwrap();
    assert_eq!(second.status, SessionStatus::Success);
    assert!(second.already_processed);
}

#[tokio::test]
async fn malformed_and_unknown_ids_are_not_found() {
    let harness = TestHarness::new();
    let gateway = gateway(&harness);

    for raw in ["not-a-uuid", "", "00000000-0000-4000-8000-000000000000"] {
        let err = gateway.view(raw).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }), "{raw:?}: {err:?}");
        let err = gateway.handle(raw, ConfirmAction::Confirm).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }), "{raw:?}: {err:?}");
    }
}

#[tokio::test]
async fn handoff_link_opens_the_same_session() {
    let harness = TestHarness::new();
    let gateway = gateway(&harness);
    let links = HandoffLinkBuilder::new("https://pay.example.com/");
    let session = harness.create_default().await.unwrap();

    let url = links.build(&session);
    let (_, raw) = url.split_once("session_id=").unwrap();

    let view = gateway.view(raw).await.unwrap();
    assert_eq!(view.session.id, session.id);
}
