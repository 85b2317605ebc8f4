//! Shared fixtures for this crate's tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parlor_messaging::driver::StubDriver;
use parlor_messaging::{DispatchGateway, MessagingConfig, SessionSupervisor};
use parlor_store::Stores;
use parlor_store::records::{Appointment, AppointmentStatus};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::notifications::NotificationService;
use crate::state::AppState;

/// A full application stack over a stub driver and temp-dir stores.
pub(crate) struct TestStack {
    pub _tmp: tempfile::TempDir,
    pub state: AppState,
    pub driver: Arc<StubDriver>,
}

/// Build the stack. `auto_ready` controls whether the stub walks straight to
/// `Ready` on connect; `pacing` is the bulk-send delay.
pub(crate) fn stack(auto_ready: bool, pacing: Duration) -> TestStack {
    let tmp = tempfile::tempdir().unwrap();
    let stores = Arc::new(Stores::open(&tmp.path().join("data")).unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = StubDriver::new(tx, auto_ready);
    let mut config = MessagingConfig::rooted_at(&tmp.path().join("messaging"));
    config.recovery_grace_ms = 0;
    config.wipe_grace_ms = 0;
    let supervisor = SessionSupervisor::spawn(driver.clone(), rx, config);
    let gateway = Arc::new(DispatchGateway::new(supervisor.clone()));
    let notifier = Arc::new(NotificationService::new(
        supervisor.clone(),
        gateway.clone(),
        stores.clone(),
        pacing,
    ));
    let state = AppState::new(supervisor, gateway, stores, notifier);
    TestStack {
        _tmp: tmp,
        state,
        driver,
    }
}

/// Let the supervisor's event pump drain pending driver events.
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Connect and wait for the stub to reach `Ready`.
pub(crate) async fn connect_ready(state: &AppState) {
    let _ = state.supervisor.connect().await.unwrap();
    settle().await;
}

/// An appointment booked for today.
pub(crate) fn today_appointment(
    name: &str,
    phone: &str,
    status: AppointmentStatus,
) -> Appointment {
    Appointment {
        id: Uuid::now_v7(),
        client_name: name.to_string(),
        client_phone: phone.to_string(),
        service_name: "Haircut".to_string(),
        date: Local::now().date_naive(),
        time: "14:00".to_string(),
        status,
        reminded: false,
        created_at: chrono::Utc::now(),
    }
}
