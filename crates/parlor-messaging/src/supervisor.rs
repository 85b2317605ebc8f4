//! The connection supervisor.
//!
//! [`SessionSupervisor`] owns exactly one driver instance and the single
//! [`SessionState`]. All connection attempts are serialized through it:
//! `connect()` performs its `Connecting` check-and-set under the state
//! mutex, driver events are consumed one at a time by a dedicated pump
//! task, and the fixed-interval reconnect timer is bound to the supervisor
//! and aborted on `disconnect()` or on reaching `Ready`.
//!
//! The supervisor is an application-lifetime object: construct it once at
//! startup with [`SessionSupervisor::spawn`] and hand the `Arc` to the HTTP
//! and scheduler layers. Background tasks hold only `Weak` references, so
//! dropping the last caller handle shuts them down.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MessagingConfig;
use crate::driver::{DriverEvent, MessagingDriver};
use crate::error::MessagingError;
use crate::pairing::{PairingArtifact, PairingPublisher};
use crate::recovery::SessionRecovery;
use crate::state::{ConnectedIdentity, Effect, SessionState, SessionStatus, StatusSnapshot};

/// Successful result of a `connect()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The session was already `Ready`; nothing was started.
    AlreadyConnected,
    /// Initialization was accepted; readiness arrives via events.
    Started,
}

/// Owns the driver and the session state machine.
pub struct SessionSupervisor {
    driver: Arc<dyn MessagingDriver>,
    config: MessagingConfig,
    state: Mutex<SessionState>,
    publisher: PairingPublisher,
    recovery: SessionRecovery,
    reconnect: Mutex<Option<JoinHandle<()>>>,
}

impl SessionSupervisor {
    /// Construct the supervisor and start its event pump.
    ///
    /// `events` is the receiving half of the channel the driver writes its
    /// events into; the pump consumes it until the channel closes or the
    /// supervisor is dropped.
    pub fn spawn(
        driver: Arc<dyn MessagingDriver>,
        events: mpsc::UnboundedReceiver<DriverEvent>,
        config: MessagingConfig,
    ) -> Arc<Self> {
        let publisher = PairingPublisher::new(config.artifact_path.clone());
        let recovery = SessionRecovery::new(
            config.session_dir.clone(),
            config.recovery_grace(),
            config.wipe_grace(),
        );
        let supervisor = Arc::new(Self {
            driver,
            config,
            state: Mutex::new(SessionState::default()),
            publisher,
            recovery,
            reconnect: Mutex::new(None),
        });
        Self::spawn_event_pump(Arc::downgrade(&supervisor), events);
        supervisor
    }

    fn spawn_event_pump(weak: Weak<Self>, mut events: mpsc::UnboundedReceiver<DriverEvent>) {
        let _ = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(supervisor) = weak.upgrade() else {
                    break;
                };
                supervisor.handle_event(event).await;
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Start a connect attempt.
    ///
    /// Idempotent when already `Ready`. Fails with
    /// [`MessagingError::AlreadyInProgress`] when an attempt is in flight.
    /// Success means initialization was accepted, not that the session is
    /// usable yet; poll [`Self::status_snapshot`] for progress.
    pub async fn connect(self: &Arc<Self>) -> Result<ConnectOutcome, MessagingError> {
        {
            let mut state = self.state.lock();
            match state.status {
                SessionStatus::Ready => return Ok(ConnectOutcome::AlreadyConnected),
                SessionStatus::Connecting => return Err(MessagingError::AlreadyInProgress),
                _ => state.begin_connecting(),
            }
        }
        info!("starting messaging session connect");

        // best-effort precaution; a failed cleanup never blocks the attempt
        self.recovery.clean_corrupted(self.driver.as_ref()).await;

        match self.driver.initialize().await {
            Ok(()) => Ok(ConnectOutcome::Started),
            Err(e) => {
                warn!(error = %e, "driver rejected initialization");
                if e.is_corruption_signature() {
                    self.recovery.clean_corrupted(self.driver.as_ref()).await;
                }
                self.state.lock().fail_initialize(&e.to_string());
                Err(MessagingError::InitializationError {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Explicit operator logout: cancel any pending reconnect, tear the
    /// driver down, reset counters, clear pairing artifacts and identity.
    /// No auto-reconnect follows.
    pub async fn disconnect(&self) {
        info!("disconnecting messaging session");
        self.cancel_reconnect();
        if let Err(e) = self.driver.destroy().await {
            warn!(error = %e, "driver teardown failed during disconnect");
        }
        self.state.lock().reset_for_logout();
        self.publisher.clear();
    }

    /// Operator-only full session wipe: disconnect, then delete everything
    /// in the driver's session storage. The next connect needs a fresh
    /// pairing.
    pub async fn clear_session(&self) {
        self.disconnect().await;
        self.recovery.wipe().await;
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    /// Full snapshot for status polling.
    pub fn status_snapshot(&self) -> StatusSnapshot {
        self.state.lock().snapshot(self.config.max_retries)
    }

    /// Identity of the connected account, if `Authenticated` or `Ready`.
    pub fn identity(&self) -> Option<ConnectedIdentity> {
        self.state.lock().identity.clone()
    }

    /// The short pairing code, while one is pending.
    pub fn pairing_code(&self) -> Option<String> {
        self.state.lock().pairing_code.clone()
    }

    /// The latest scannable pairing artifact, if any.
    pub fn current_artifact(&self) -> Option<PairingArtifact> {
        self.publisher.current()
    }

    /// Whether a reconnect timer is currently armed.
    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn driver(&self) -> &Arc<dyn MessagingDriver> {
        &self.driver
    }

    pub(crate) fn config(&self) -> &MessagingConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event handling
    // ─────────────────────────────────────────────────────────────────────

    async fn handle_event(self: &Arc<Self>, event: DriverEvent) {
        debug!(event = ?event, "driver event");
        let effects = {
            let mut state = self.state.lock();
            state.apply(&event, self.config.max_retries)
        };
        for effect in effects {
            match effect {
                Effect::PublishArtifact(raw) => {
                    if let Err(e) = self.publisher.publish(&raw) {
                        warn!(error = %e, "failed to publish pairing artifact");
                    }
                }
                Effect::ClearArtifacts => self.publisher.clear(),
                Effect::CancelReconnect => self.cancel_reconnect(),
                Effect::ScheduleReconnect => self.schedule_reconnect(),
                Effect::TearDownDriver => {
                    debug!("ready arrived after logout; tearing driver down");
                    if let Err(e) = self.driver.destroy().await {
                        debug!(error = %e, "teardown after stale ready failed");
                    }
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reconnect timer
    // ─────────────────────────────────────────────────────────────────────

    /// Arm the fixed-interval reconnect timer if it is not already running.
    ///
    /// Each tick re-checks conditions: done when `Ready`, waits while an
    /// attempt is in flight, gives up at the retry cap, and otherwise
    /// increments the counter and calls `connect()`.
    fn schedule_reconnect(self: &Arc<Self>) {
        let mut slot = self.reconnect.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        info!(
            interval_ms = self.config.reconnect_interval_ms,
            max_retries = self.config.max_retries,
            "scheduling automatic reconnect"
        );
        let weak = Arc::downgrade(self);
        let interval = self.config.reconnect_interval();
        let max_retries = self.config.max_retries;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first interval tick fires immediately; the first attempt
            // should wait one full interval after the disconnect
            let _ = ticker.tick().await;
            loop {
                let _ = ticker.tick().await;
                let Some(supervisor) = weak.upgrade() else {
                    break;
                };
                let attempt = {
                    let mut state = supervisor.state.lock();
                    match state.status {
                        SessionStatus::Ready => break,
                        SessionStatus::Connecting => continue,
                        _ if state.retry_count >= max_retries => {
                            warn!(
                                retries = state.retry_count,
                                "reconnect attempts exhausted; manual intervention required"
                            );
                            break;
                        }
                        _ => {
                            state.retry_count += 1;
                            state.retry_count
                        }
                    }
                };
                info!(attempt, max_retries, "automatic reconnect attempt");
                if let Err(e) = supervisor.connect().await {
                    warn!(attempt, error = %e, "reconnect attempt failed");
                }
            }
        }));
    }

    fn cancel_reconnect(&self) {
        if let Some(handle) = self.reconnect.lock().take() {
            handle.abort();
            debug!("reconnect timer cancelled");
        }
    }

    #[cfg(test)]
    pub(crate) fn force_state<F: FnOnce(&mut SessionState)>(&self, mutate: F) {
        mutate(&mut self.state.lock());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::StubDriver;
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> MessagingConfig {
        MessagingConfig {
            session_dir: dir.join("session"),
            artifact_path: dir.join("artifact.json"),
            max_retries: 3,
            reconnect_interval_ms: 10_000,
            recovery_grace_ms: 0,
            wipe_grace_ms: 0,
            address_suffix: "@c.us".to_string(),
        }
    }

    /// Let the event pump drain pending driver events.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn stack(
        auto_ready: bool,
        dir: &std::path::Path,
    ) -> (Arc<StubDriver>, Arc<SessionSupervisor>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = StubDriver::new(tx, auto_ready);
        let supervisor = SessionSupervisor::spawn(driver.clone(), rx, test_config(dir));
        (driver, supervisor)
    }

    #[tokio::test]
    async fn connect_reaches_ready_via_events() {
        let tmp = tempfile::tempdir().unwrap();
        let (_driver, supervisor) = stack(true, tmp.path());

        let outcome = supervisor.connect().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Started);
        settle().await;

        let snapshot = supervisor.status_snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert!(snapshot.identity.is_some());
        assert_eq!(snapshot.retry_count, 0);
        assert!(!snapshot.has_qr_code);
    }

    #[tokio::test]
    async fn connect_is_idempotent_when_ready() {
        let tmp = tempfile::tempdir().unwrap();
        let (driver, supervisor) = stack(true, tmp.path());

        let _ = supervisor.connect().await.unwrap();
        settle().await;
        let identity_before = supervisor.identity();

        let outcome = supervisor.connect().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::AlreadyConnected);
        assert_eq!(driver.init_calls(), 1);
        assert_eq!(supervisor.identity(), identity_before);
    }

    #[tokio::test]
    async fn concurrent_connect_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (_driver, supervisor) = stack(false, tmp.path());

        let _ = supervisor.connect().await.unwrap();
        settle().await;
        // stub without auto-ready leaves the session awaiting a code; force
        // the in-flight state the guard protects
        supervisor.force_state(|s| s.status = SessionStatus::Connecting);

        let err = supervisor.connect().await.unwrap_err();
        assert_eq!(err, MessagingError::AlreadyInProgress);
    }

    #[tokio::test]
    async fn initialization_rejection_surfaces_and_resets() {
        let tmp = tempfile::tempdir().unwrap();
        let (driver, supervisor) = stack(false, tmp.path());
        driver.fail_next_initialize(crate::driver::DriverError::Initialization(
            "browser missing".into(),
        ));

        let err = supervisor.connect().await.unwrap_err();
        assert!(matches!(err, MessagingError::InitializationError { .. }));
        assert_eq!(supervisor.status(), SessionStatus::Disconnected);
        let snapshot = supervisor.status_snapshot();
        assert_eq!(snapshot.last_error.as_deref().unwrap_or(""), "initialization failed: browser missing");
    }

    #[tokio::test]
    async fn pairing_artifact_published_while_awaiting_code() {
        let tmp = tempfile::tempdir().unwrap();
        let (_driver, supervisor) = stack(false, tmp.path());

        let _ = supervisor.connect().await.unwrap();
        settle().await;

        assert_eq!(supervisor.status(), SessionStatus::AwaitingCode);
        assert_eq!(supervisor.pairing_code().as_deref(), Some("STUB-1234"));
        let artifact = supervisor.current_artifact().unwrap();
        assert_eq!(artifact.raw_code, "stub-pairing-payload");
        assert!(artifact.rendered_image.is_some());
    }

    #[tokio::test]
    async fn disconnect_resets_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let (driver, supervisor) = stack(true, tmp.path());

        let _ = supervisor.connect().await.unwrap();
        settle().await;
        supervisor.disconnect().await;

        let snapshot = supervisor.status_snapshot();
        assert_eq!(snapshot.status, SessionStatus::Disconnected);
        assert_eq!(snapshot.retry_count, 0);
        assert!(snapshot.identity.is_none());
        assert!(!supervisor.has_pending_reconnect());
        assert!(supervisor.current_artifact().is_none());
        assert!(driver.destroy_calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_disconnect_triggers_automatic_reconnect() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = StubDriver::new(tx.clone(), true);
        let supervisor = SessionSupervisor::spawn(driver.clone(), rx, test_config(tmp.path()));

        let _ = supervisor.connect().await.unwrap();
        settle().await;
        assert_eq!(supervisor.status(), SessionStatus::Ready);

        tx.send(DriverEvent::Disconnected(
            crate::driver::DisconnectReason::Other("stream errored".into()),
        ))
        .unwrap();
        settle().await;

        assert_eq!(supervisor.status(), SessionStatus::Disconnected);
        assert!(supervisor.has_pending_reconnect());

        tokio::time::advance(Duration::from_millis(10_050)).await;
        settle().await;

        // the timer incremented the counter and re-ran connect; the stub
        // then walked the session back to ready
        assert_eq!(driver.init_calls(), 2);
        assert_eq!(supervisor.status(), SessionStatus::Ready);
        assert_eq!(supervisor.status_snapshot().retry_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_gives_up_at_the_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        // never reaches ready: every initialize only re-issues a code, and we
        // knock the session back down after each attempt
        let driver = StubDriver::new(tx.clone(), false);
        let supervisor = SessionSupervisor::spawn(driver.clone(), rx, test_config(tmp.path()));

        tx.send(DriverEvent::Disconnected(
            crate::driver::DisconnectReason::Other("drop".into()),
        ))
        .unwrap();
        settle().await;
        assert!(supervisor.has_pending_reconnect());

        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(10_050)).await;
            settle().await;
            // each attempt lands in AwaitingCode; simulate another drop
            supervisor.force_state(|s| {
                s.status = SessionStatus::Disconnected;
                s.pairing_code = None;
                s.qr_payload = None;
            });
        }
        assert_eq!(driver.init_calls(), 3);
        assert_eq!(supervisor.status_snapshot().retry_count, 3);

        // cap reached: the next tick exits without another attempt
        tokio::time::advance(Duration::from_millis(10_050)).await;
        settle().await;
        assert_eq!(driver.init_calls(), 3);
        assert_eq!(supervisor.status(), SessionStatus::Disconnected);
        assert!(!supervisor.has_pending_reconnect());
    }

    #[tokio::test]
    async fn auth_failure_is_terminal_until_operator_reconnects() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = StubDriver::new(tx.clone(), false);
        let supervisor = SessionSupervisor::spawn(driver.clone(), rx, test_config(tmp.path()));

        let _ = supervisor.connect().await.unwrap();
        settle().await;
        tx.send(DriverEvent::AuthFailed("credentials rejected".into()))
            .unwrap();
        settle().await;

        assert_eq!(supervisor.status(), SessionStatus::Failed);
        assert!(!supervisor.has_pending_reconnect());
        assert!(supervisor.current_artifact().is_none());

        // an explicit operator connect re-enters the cycle
        let outcome = supervisor.connect().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::Started);
        assert_eq!(driver.init_calls(), 2);
    }

    #[tokio::test]
    async fn late_ready_after_disconnect_is_ignored_and_torn_down() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = StubDriver::new(tx.clone(), false);
        let supervisor = SessionSupervisor::spawn(driver.clone(), rx, test_config(tmp.path()));

        let _ = supervisor.connect().await.unwrap();
        settle().await;
        supervisor.disconnect().await;
        let teardowns_after_disconnect = driver.destroy_calls();

        tx.send(DriverEvent::Ready(StubDriver::identity())).unwrap();
        settle().await;

        assert_eq!(supervisor.status(), SessionStatus::Disconnected);
        assert!(supervisor.identity().is_none());
        assert_eq!(driver.destroy_calls(), teardowns_after_disconnect + 1);
    }

    #[tokio::test]
    async fn clear_session_wipes_storage() {
        let tmp = tempfile::tempdir().unwrap();
        let session_dir = tmp.path().join("session");
        std::fs::create_dir_all(&session_dir).unwrap();
        std::fs::write(session_dir.join("credentials.json"), "{}").unwrap();
        let (_driver, supervisor) = stack(false, tmp.path());

        supervisor.clear_session().await;

        assert_eq!(supervisor.status(), SessionStatus::Disconnected);
        assert_eq!(std::fs::read_dir(&session_dir).unwrap().count(), 0);
    }
}
