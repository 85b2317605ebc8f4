//! End-to-end lifecycle tests over the crate's public surface.

use std::sync::Arc;
use std::time::Duration;

use parlor_messaging::driver::{DisconnectReason, DriverEvent, StubDriver};
use parlor_messaging::{
    ConnectOutcome, DispatchGateway, MessagingConfig, MessagingError, SessionStatus,
    SessionSupervisor,
};
use tokio::sync::mpsc;

fn config(dir: &std::path::Path) -> MessagingConfig {
    let mut config = MessagingConfig::rooted_at(dir);
    config.recovery_grace_ms = 0;
    config.wipe_grace_ms = 0;
    config
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn pairing_walkthrough_reaches_ready_and_sends() {
    let tmp = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = StubDriver::new(tx, true);
    let supervisor = SessionSupervisor::spawn(driver.clone(), rx, config(tmp.path()));
    let gateway = DispatchGateway::new(Arc::clone(&supervisor));

    assert_eq!(supervisor.status(), SessionStatus::Disconnected);
    assert_eq!(supervisor.connect().await.unwrap(), ConnectOutcome::Started);
    settle().await;

    let snapshot = supervisor.status_snapshot();
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(
        snapshot.identity.unwrap().external_id,
        "5511999990000@c.us"
    );

    let receipt = gateway.send("5511987654321", "walkthrough").await.unwrap();
    assert_eq!(receipt.recipient, "5511987654321");
    assert_eq!(driver.sent().len(), 1);
}

#[tokio::test]
async fn send_fails_not_ready_through_the_whole_lifecycle_edge() {
    let tmp = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = StubDriver::new(tx, true);
    let supervisor = SessionSupervisor::spawn(driver.clone(), rx, config(tmp.path()));
    let gateway = DispatchGateway::new(Arc::clone(&supervisor));

    // before any connect
    let err = gateway.send("5511987654321", "hi").await.unwrap_err();
    assert!(matches!(err, MessagingError::NotReady { .. }));

    // after an explicit disconnect
    let _ = supervisor.connect().await.unwrap();
    settle().await;
    supervisor.disconnect().await;
    let err = gateway.send("5511987654321", "hi").await.unwrap_err();
    assert_eq!(
        err,
        MessagingError::NotReady {
            status: SessionStatus::Disconnected
        }
    );
    assert_eq!(driver.sent().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_link_reconnects_automatically() {
    let tmp = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = StubDriver::new(tx.clone(), true);
    let supervisor = SessionSupervisor::spawn(driver.clone(), rx, config(tmp.path()));

    let _ = supervisor.connect().await.unwrap();
    settle().await;
    assert_eq!(supervisor.status(), SessionStatus::Ready);

    tx.send(DriverEvent::Disconnected(DisconnectReason::Other(
        "stream errored".into(),
    )))
    .unwrap();
    settle().await;
    assert_eq!(supervisor.status(), SessionStatus::Disconnected);

    tokio::time::advance(Duration::from_millis(10_050)).await;
    settle().await;

    assert_eq!(driver.init_calls(), 2);
    assert_eq!(supervisor.status(), SessionStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn operator_logout_suppresses_reconnect() {
    let tmp = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = StubDriver::new(tx.clone(), true);
    let supervisor = SessionSupervisor::spawn(driver.clone(), rx, config(tmp.path()));

    let _ = supervisor.connect().await.unwrap();
    settle().await;
    supervisor.disconnect().await;

    // a late disconnect event from the dying driver must not arm a retry
    tx.send(DriverEvent::Disconnected(DisconnectReason::Other(
        "navigation".into(),
    )))
    .unwrap();
    settle().await;

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(driver.init_calls(), 1);
    assert_eq!(supervisor.status(), SessionStatus::Disconnected);
}

#[tokio::test]
async fn pairing_artifact_round_trips_through_polling() {
    let tmp = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = StubDriver::new(tx, false);
    let supervisor = SessionSupervisor::spawn(driver, rx, config(tmp.path()));

    let _ = supervisor.connect().await.unwrap();
    settle().await;

    assert_eq!(supervisor.status(), SessionStatus::AwaitingCode);
    let artifact = supervisor.current_artifact().unwrap();
    assert_eq!(artifact.raw_code, "stub-pairing-payload");
    assert!(
        artifact
            .rendered_image
            .unwrap()
            .starts_with("data:image/svg+xml;base64,")
    );
    assert_eq!(supervisor.pairing_code().as_deref(), Some("STUB-1234"));
}
