//! Typed records and the appointment queries the messaging layer needs.
//!
//! Field names serialize camelCase to match the HTTP surface. `id` defaults
//! to a fresh v7 uuid so create payloads may omit it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_store::{JsonStore, Record};
use crate::StoreError;

fn new_id() -> Uuid {
    Uuid::now_v7()
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

// ─────────────────────────────────────────────────────────────────────────────
// Appointment
// ─────────────────────────────────────────────────────────────────────────────

/// Appointment lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked, not yet confirmed with the client.
    Scheduled,
    /// Awaiting shop approval.
    Pending,
    /// Confirmed with the client.
    Confirmed,
    /// Cancelled by either side.
    Cancelled,
}

impl AppointmentStatus {
    /// Whether a confirmation message should still be sent for this status.
    #[must_use]
    pub fn awaits_confirmation(self) -> bool {
        matches!(self, Self::Scheduled | Self::Pending)
    }
}

/// A booked appointment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Record id.
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Client display name.
    pub client_name: String,
    /// Client phone number as entered.
    pub client_phone: String,
    /// Booked service name.
    pub service_name: String,
    /// Appointment date.
    pub date: NaiveDate,
    /// Appointment time, `HH:MM`.
    pub time: String,
    /// Lifecycle status.
    pub status: AppointmentStatus,
    /// Whether a reminder has already been sent.
    #[serde(default)]
    pub reminded: bool,
    /// Creation timestamp.
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

impl Record for Appointment {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl JsonStore<Appointment> {
    /// All appointments booked for `date`.
    pub fn on_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.load()?.into_iter().filter(|a| a.date == date).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Other records
// ─────────────────────────────────────────────────────────────────────────────

/// A client contact record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Record id.
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Optional email.
    #[serde(default)]
    pub email: Option<String>,
}

impl Record for Client {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A service the shop offers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffering {
    /// Record id.
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Service name.
    pub name: String,
    /// Price in the shop's currency.
    pub price: f64,
    /// Duration in minutes.
    pub duration_minutes: u32,
}

impl Record for ServiceOffering {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A staff member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    /// Record id.
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Role label (barber, receptionist, ...).
    pub role: String,
    /// Whether the member currently takes bookings.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Record for StaffMember {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A client review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Record id.
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Reviewer display name.
    pub client_name: String,
    /// Rating, 1-5.
    pub rating: u8,
    /// Free-text comment.
    #[serde(default)]
    pub comment: String,
    /// Creation timestamp.
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

impl Record for Review {
    fn id(&self) -> Uuid {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
