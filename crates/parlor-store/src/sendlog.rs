//! Append-only log of outbound messages.
//!
//! Every dispatch attempt is recorded here regardless of outcome so
//! operators can audit what the shop actually sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_store::{JsonStore, Record};
use crate::StoreError;

/// Why a message was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendKind {
    /// Operator-initiated single send.
    Manual,
    /// Bulk appointment confirmation.
    Confirmation,
    /// Bulk cancellation notice.
    Cancellation,
    /// Appointment reminder.
    Reminder,
    /// Daily report to the shop owner.
    Report,
}

/// Outcome of a dispatch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    /// Driver accepted the message.
    Sent,
    /// Dispatch failed; `detail` carries the error text.
    Failed,
}

/// One outbound message attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendLogEntry {
    /// Record id.
    pub id: Uuid,
    /// When the attempt happened.
    pub timestamp: DateTime<Utc>,
    /// Normalized recipient.
    pub recipient: String,
    /// Why the message was sent.
    pub kind: SendKind,
    /// Outcome.
    pub status: SendStatus,
    /// Driver-assigned message id on success.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Error text on failure.
    #[serde(default)]
    pub detail: Option<String>,
}

impl Record for SendLogEntry {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// The send log store.
pub struct SendLog {
    store: JsonStore<SendLogEntry>,
}

impl SendLog {
    /// Create a log backed by `path`.
    #[must_use]
    pub fn new(path: std::path::PathBuf) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    /// Record a successful send.
    pub fn record_sent(
        &self,
        recipient: &str,
        kind: SendKind,
        message_id: &str,
    ) -> Result<(), StoreError> {
        let _ = self.store.insert(SendLogEntry {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            recipient: recipient.to_string(),
            kind,
            status: SendStatus::Sent,
            message_id: Some(message_id.to_string()),
            detail: None,
        })?;
        Ok(())
    }

    /// Record a failed send.
    pub fn record_failed(
        &self,
        recipient: &str,
        kind: SendKind,
        detail: &str,
    ) -> Result<(), StoreError> {
        let _ = self.store.insert(SendLogEntry {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            recipient: recipient.to_string(),
            kind,
            status: SendStatus::Failed,
            message_id: None,
            detail: Some(detail.to_string()),
        })?;
        Ok(())
    }

    /// The most recent `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SendLogEntry>, StoreError> {
        let all = self.store.load()?;
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }

    /// Drop every entry.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.save(&[])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> (tempfile::TempDir, SendLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = SendLog::new(dir.path().join("send_log.json"));
        (dir, log)
    }

    #[test]
    fn records_both_outcomes() {
        let (_dir, log) = log();
        log.record_sent("5511987654321", SendKind::Manual, "msg-1")
            .unwrap();
        log.record_failed("5511987654321", SendKind::Reminder, "driver down")
            .unwrap();

        let entries = log.recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, SendStatus::Sent);
        assert_eq!(entries[0].message_id.as_deref(), Some("msg-1"));
        assert_eq!(entries[1].status, SendStatus::Failed);
        assert_eq!(entries[1].detail.as_deref(), Some("driver down"));
    }

    #[test]
    fn recent_keeps_only_tail() {
        let (_dir, log) = log();
        for i in 0..5 {
            log.record_sent("55", SendKind::Manual, &format!("m{i}"))
                .unwrap();
        }
        let tail = log.recent(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].message_id.as_deref(), Some("m4"));
    }

    #[test]
    fn clear_empties_log() {
        let (_dir, log) = log();
        log.record_sent("55", SendKind::Manual, "m").unwrap();
        log.clear().unwrap();
        assert!(log.recent(10).unwrap().is_empty());
    }
}
