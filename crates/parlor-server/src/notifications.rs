//! Bulk sends, reminders and the daily report.
//!
//! These are callers of the dispatch gateway, not part of it: the gateway
//! never retries or paces, so the fixed inter-message delay that keeps the
//! platform's abuse controls happy lives here. Per-recipient failures are
//! counted and logged, never fatal to the batch.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parlor_messaging::{DispatchGateway, MessagingError, SessionStatus, SessionSupervisor};
use parlor_store::records::{Appointment, AppointmentStatus};
use parlor_store::sendlog::SendKind;
use parlor_store::Stores;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ServerError;

/// Result of a bulk send.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// Recipients considered.
    pub total: usize,
    /// Messages the driver accepted.
    pub sent: usize,
    /// Failed dispatches.
    pub failed: usize,
}

/// Sends appointment notifications through the gateway.
pub struct NotificationService {
    supervisor: Arc<SessionSupervisor>,
    gateway: Arc<DispatchGateway>,
    stores: Arc<Stores>,
    pacing: Duration,
}

impl NotificationService {
    /// Create the service. `pacing` is the fixed delay between consecutive
    /// sends in one batch.
    #[must_use]
    pub fn new(
        supervisor: Arc<SessionSupervisor>,
        gateway: Arc<DispatchGateway>,
        stores: Arc<Stores>,
        pacing: Duration,
    ) -> Self {
        Self {
            supervisor,
            gateway,
            stores,
            pacing,
        }
    }

    fn require_ready(&self) -> Result<(), ServerError> {
        let status = self.supervisor.status();
        if status == SessionStatus::Ready {
            Ok(())
        } else {
            Err(MessagingError::NotReady { status }.into())
        }
    }

    /// Confirm every appointment booked for today that is still awaiting
    /// confirmation. Successfully notified appointments flip to `Confirmed`.
    pub async fn send_bulk_confirmations(&self) -> Result<BulkOutcome, ServerError> {
        self.require_ready()?;
        let today = Local::now().date_naive();
        let due: Vec<Appointment> = self
            .stores
            .appointments
            .on_date(today)?
            .into_iter()
            .filter(|a| a.status.awaits_confirmation())
            .collect();

        let mut outcome = BulkOutcome {
            total: due.len(),
            ..BulkOutcome::default()
        };
        for (index, appointment) in due.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let message = format!(
                "Hello {}! Your {} appointment today at {} is confirmed. See you soon!",
                appointment.client_name, appointment.service_name, appointment.time
            );
            match self.gateway.send(&appointment.client_phone, &message).await {
                Ok(receipt) => {
                    outcome.sent += 1;
                    self.flip_status(appointment, AppointmentStatus::Confirmed);
                    self.log_sent(&receipt.recipient, SendKind::Confirmation, &receipt.message_id);
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!(appointment = %appointment.id, error = %e, "confirmation failed");
                    self.log_failed(&appointment.client_phone, SendKind::Confirmation, &e);
                }
            }
        }
        info!(?outcome, "bulk confirmations finished");
        Ok(outcome)
    }

    /// Notify every appointment booked for today that the shop is
    /// cancelling, flipping notified appointments to `Cancelled`.
    pub async fn send_bulk_cancellations(&self, reason: &str) -> Result<BulkOutcome, ServerError> {
        self.require_ready()?;
        let today = Local::now().date_naive();
        let due: Vec<Appointment> = self
            .stores
            .appointments
            .on_date(today)?
            .into_iter()
            .filter(|a| a.status != AppointmentStatus::Cancelled)
            .collect();

        let mut outcome = BulkOutcome {
            total: due.len(),
            ..BulkOutcome::default()
        };
        for (index, appointment) in due.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let message = format!(
                "Hello {}! Unfortunately we have to cancel your appointment today at {}. Reason: {reason}",
                appointment.client_name, appointment.time
            );
            match self.gateway.send(&appointment.client_phone, &message).await {
                Ok(receipt) => {
                    outcome.sent += 1;
                    self.flip_status(appointment, AppointmentStatus::Cancelled);
                    self.log_sent(&receipt.recipient, SendKind::Cancellation, &receipt.message_id);
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!(appointment = %appointment.id, error = %e, "cancellation notice failed");
                    self.log_failed(&appointment.client_phone, SendKind::Cancellation, &e);
                }
            }
        }
        info!(?outcome, "bulk cancellations finished");
        Ok(outcome)
    }

    /// Remind today's not-yet-reminded, not-cancelled appointments.
    pub async fn send_reminders(&self) -> Result<BulkOutcome, ServerError> {
        self.require_ready()?;
        let today = Local::now().date_naive();
        let due: Vec<Appointment> = self
            .stores
            .appointments
            .on_date(today)?
            .into_iter()
            .filter(|a| !a.reminded && a.status != AppointmentStatus::Cancelled)
            .collect();

        let mut outcome = BulkOutcome {
            total: due.len(),
            ..BulkOutcome::default()
        };
        for (index, appointment) in due.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let message = format!(
                "Reminder: {} today at {} for {}. Reply here if you need to reschedule.",
                appointment.service_name, appointment.time, appointment.client_name
            );
            match self.gateway.send(&appointment.client_phone, &message).await {
                Ok(receipt) => {
                    outcome.sent += 1;
                    if let Err(e) = self
                        .stores
                        .appointments
                        .update(appointment.id, |a| a.reminded = true)
                    {
                        warn!(appointment = %appointment.id, error = %e, "could not mark reminded");
                    }
                    self.log_sent(&receipt.recipient, SendKind::Reminder, &receipt.message_id);
                }
                Err(e) => {
                    outcome.failed += 1;
                    warn!(appointment = %appointment.id, error = %e, "reminder failed");
                    self.log_failed(&appointment.client_phone, SendKind::Reminder, &e);
                }
            }
        }
        Ok(outcome)
    }

    /// Send today's aggregate report to the connected account itself.
    pub async fn send_daily_report(&self) -> Result<(), ServerError> {
        let identity = self
            .supervisor
            .identity()
            .ok_or(MessagingError::NotReady {
                status: self.supervisor.status(),
            })?;
        let owner = identity.own_number().ok_or_else(|| {
            ServerError::Internal("connected identity has no phone number".to_string())
        })?;

        let today = Local::now().date_naive();
        let todays = self.stores.appointments.on_date(today)?;
        let total = todays.len();
        let confirmed = todays
            .iter()
            .filter(|a| a.status == AppointmentStatus::Confirmed)
            .count();
        let cancelled = todays
            .iter()
            .filter(|a| a.status == AppointmentStatus::Cancelled)
            .count();
        let revenue = self.estimated_revenue(&todays)?;

        let message = format!(
            "Daily report for {today}\n\
             Appointments: {total}\n\
             Confirmed: {confirmed}\n\
             Cancelled: {cancelled}\n\
             Estimated revenue: {revenue:.2}"
        );

        match self.gateway.send(&owner, &message).await {
            Ok(receipt) => {
                self.log_sent(&receipt.recipient, SendKind::Report, &receipt.message_id);
                Ok(())
            }
            Err(e) => {
                self.log_failed(&owner, SendKind::Report, &e);
                Err(e.into())
            }
        }
    }

    /// Sum of listed prices for today's confirmed services. Services without
    /// a matching offering contribute nothing.
    fn estimated_revenue(&self, todays: &[Appointment]) -> Result<f64, ServerError> {
        let offerings = self.stores.services.load()?;
        let revenue = todays
            .iter()
            .filter(|a| a.status == AppointmentStatus::Confirmed)
            .filter_map(|a| {
                offerings
                    .iter()
                    .find(|s| s.name == a.service_name)
                    .map(|s| s.price)
            })
            .sum();
        Ok(revenue)
    }

    fn flip_status(&self, appointment: &Appointment, status: AppointmentStatus) {
        if let Err(e) = self
            .stores
            .appointments
            .update(appointment.id, |a| a.status = status)
        {
            warn!(appointment = %appointment.id, error = %e, "could not update appointment status");
        }
    }

    fn log_sent(&self, recipient: &str, kind: SendKind, message_id: &str) {
        if let Err(e) = self.stores.send_log.record_sent(recipient, kind, message_id) {
            warn!(error = %e, "could not append to send log");
        }
    }

    fn log_failed(&self, recipient: &str, kind: SendKind, error: &MessagingError) {
        if let Err(e) = self
            .stores
            .send_log
            .record_failed(recipient, kind, &error.to_string())
        {
            warn!(error = %e, "could not append to send log");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
