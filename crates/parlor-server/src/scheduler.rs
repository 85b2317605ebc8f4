//! Periodic jobs bound to the application lifetime.
//!
//! Two tasks: a reminder sweep on a fixed interval and a daily report fired
//! once per local day at the configured hour. Both skip silently while the
//! session is not `Ready` and stop when the scheduler is shut down.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, Timelike};
use parlor_messaging::{SessionStatus, SessionSupervisor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notifications::NotificationService;

/// How often the report task re-checks the local clock.
const REPORT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Scheduler configuration.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Seconds between reminder sweeps.
    pub reminder_interval_secs: u64,
    /// Local hour (0-23) the daily report fires.
    pub report_hour: u32,
}

/// Handle over the running periodic tasks.
pub struct Scheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the reminder sweep and daily report tasks.
    #[must_use]
    pub fn start(
        notifier: Arc<NotificationService>,
        supervisor: Arc<SessionSupervisor>,
        config: SchedulerConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handles = vec![
            spawn_reminder_sweep(
                Arc::clone(&notifier),
                Arc::clone(&supervisor),
                config.reminder_interval_secs,
                cancel.clone(),
            ),
            spawn_daily_report(notifier, supervisor, config.report_hour, cancel.clone()),
        ];
        Self { cancel, handles }
    }

    /// Stop both tasks and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("scheduler stopped");
    }
}

fn spawn_reminder_sweep(
    notifier: Arc<NotificationService>,
    supervisor: Arc<SessionSupervisor>,
    interval_secs: u64,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // skip the immediate first tick
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if supervisor.status() != SessionStatus::Ready {
                        debug!("session not ready, skipping reminder sweep");
                        continue;
                    }
                    match notifier.send_reminders().await {
                        Ok(outcome) if outcome.total > 0 => {
                            info!(sent = outcome.sent, failed = outcome.failed, "reminder sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "reminder sweep failed"),
                    }
                }
            }
        }
    })
}

fn spawn_daily_report(
    notifier: Arc<NotificationService>,
    supervisor: Arc<SessionSupervisor>,
    report_hour: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_sent: Option<NaiveDate> = None;
        let mut ticker = tokio::time::interval(REPORT_CHECK_INTERVAL);
        let _ = ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Local::now();
                    let today = now.date_naive();
                    if now.hour() != report_hour || last_sent == Some(today) {
                        continue;
                    }
                    if supervisor.status() != SessionStatus::Ready {
                        debug!("session not ready, skipping daily report");
                        continue;
                    }
                    match notifier.send_daily_report().await {
                        Ok(()) => {
                            last_sent = Some(today);
                            info!("daily report sent");
                        }
                        Err(e) => warn!(error = %e, "daily report failed"),
                    }
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
