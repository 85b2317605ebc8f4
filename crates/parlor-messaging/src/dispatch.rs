//! The dispatch gateway: the sole path for outbound messages.
//!
//! The gateway enforces what the supervisor's state machine guarantees:
//! sends only happen while the session is `Ready`, recipients are
//! normalized and validated, and the platform registration check runs
//! before the actual send. Nothing here retries; bulk callers own their
//! pacing and retry policy.

use std::sync::Arc;

use parlor_core::phone::{is_addressed, normalize_digits};
use serde::Serialize;
use tracing::debug;

use crate::error::MessagingError;
use crate::state::SessionStatus;
use crate::supervisor::SessionSupervisor;

/// Minimum digits a recipient must normalize to.
const MIN_RECIPIENT_DIGITS: usize = 10;

/// Acknowledgment of a dispatched message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    /// Driver-assigned message id.
    pub message_id: String,
    /// Normalized recipient digits.
    pub recipient: String,
}

/// Outbound message gateway bound to one supervisor.
pub struct DispatchGateway {
    supervisor: Arc<SessionSupervisor>,
}

impl DispatchGateway {
    /// Create a gateway delegating to `supervisor`'s driver.
    #[must_use]
    pub fn new(supervisor: Arc<SessionSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Send `body` to `recipient`.
    ///
    /// Fails with [`MessagingError::NotReady`] before touching the driver
    /// whenever the session is not `Ready`; with
    /// [`MessagingError::InvalidRecipient`] when fewer than 10 digits
    /// remain after normalization; with
    /// [`MessagingError::UnregisteredRecipient`] when the platform reports
    /// no account for the address; and with
    /// [`MessagingError::DispatchError`] when the driver's send fails.
    pub async fn send(
        &self,
        recipient: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, MessagingError> {
        let status = self.supervisor.status();
        if status != SessionStatus::Ready {
            return Err(MessagingError::NotReady { status });
        }

        let digits = normalize_digits(recipient);
        if digits.len() < MIN_RECIPIENT_DIGITS {
            return Err(MessagingError::InvalidRecipient {
                input: recipient.to_string(),
            });
        }
        let address = if is_addressed(recipient) {
            recipient.to_string()
        } else {
            format!("{digits}{}", self.supervisor.config().address_suffix)
        };

        let driver = self.supervisor.driver();
        let registered = driver
            .is_registered_user(&address)
            .await
            .map_err(|e| MessagingError::DispatchError {
                message: e.to_string(),
            })?;
        if !registered {
            return Err(MessagingError::UnregisteredRecipient { address });
        }

        let message_id =
            driver
                .send_message(&address, body)
                .await
                .map_err(|e| MessagingError::DispatchError {
                    message: e.to_string(),
                })?;
        debug!(recipient = %digits, message_id = %message_id, "message dispatched");
        Ok(DeliveryReceipt {
            message_id,
            recipient: digits,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MessagingConfig;
    use crate::driver::{DriverError, MockMessagingDriver, StubDriver};
    use crate::state::{ConnectedIdentity, SessionStatus};
    use tokio::sync::mpsc;

    fn ready_identity() -> ConnectedIdentity {
        ConnectedIdentity {
            external_id: "5511999990000@c.us".into(),
            display_name: None,
            phone_number: Some("5511999990000".into()),
        }
    }

    fn gateway_with(driver: Arc<dyn crate::driver::MessagingDriver>, ready: bool) -> DispatchGateway {
        let (_tx, rx) = mpsc::unbounded_channel();
        let tmp = std::env::temp_dir().join(format!("parlor-dispatch-{}", uuid::Uuid::now_v7()));
        let supervisor = SessionSupervisor::spawn(driver, rx, MessagingConfig::rooted_at(&tmp));
        if ready {
            supervisor.force_state(|s| {
                s.status = SessionStatus::Ready;
                s.identity = Some(ready_identity());
            });
        }
        DispatchGateway::new(supervisor)
    }

    #[tokio::test]
    async fn send_while_not_ready_never_reaches_driver() {
        // a mock with no expectations panics on any call
        let driver = Arc::new(MockMessagingDriver::new());
        let gateway = gateway_with(driver, false);

        let err = gateway.send("5511987654321", "hi").await.unwrap_err();
        assert_eq!(
            err,
            MessagingError::NotReady {
                status: SessionStatus::Disconnected
            }
        );
    }

    #[tokio::test]
    async fn short_recipient_is_invalid_before_driver() {
        let driver = Arc::new(MockMessagingDriver::new());
        let gateway = gateway_with(driver, true);

        let err = gateway.send("119999", "hi").await.unwrap_err();
        assert!(matches!(err, MessagingError::InvalidRecipient { .. }));
    }

    #[tokio::test]
    async fn unregistered_recipient_skips_send() {
        let mut driver = MockMessagingDriver::new();
        driver
            .expect_is_registered_user()
            .withf(|address| address == "11999990000@c.us")
            .return_const(Ok(false));
        // no expect_send_message: a send call would panic the test
        let gateway = gateway_with(Arc::new(driver), true);

        let err = gateway.send("11999990000", "hi").await.unwrap_err();
        assert_eq!(
            err,
            MessagingError::UnregisteredRecipient {
                address: "11999990000@c.us".into()
            }
        );
    }

    #[tokio::test]
    async fn successful_send_returns_receipt() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let driver = StubDriver::new(tx, false);
        let gateway = gateway_with(driver.clone(), true);

        let receipt = gateway
            .send("+55 (11) 98765-4321", "see you at 14:00")
            .await
            .unwrap();
        assert_eq!(receipt.recipient, "5511987654321");
        assert!(receipt.message_id.starts_with("stub-"));
        assert_eq!(
            driver.sent(),
            vec![(
                "5511987654321@c.us".to_string(),
                "see you at 14:00".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn addressed_recipient_passes_through() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let driver = StubDriver::new(tx, false);
        let gateway = gateway_with(driver.clone(), true);

        let _ = gateway
            .send("5511987654321@g.us", "group message")
            .await
            .unwrap();
        assert_eq!(driver.sent()[0].0, "5511987654321@g.us");
    }

    #[tokio::test]
    async fn driver_send_failure_maps_to_dispatch_error() {
        let mut driver = MockMessagingDriver::new();
        driver
            .expect_is_registered_user()
            .return_const(Ok(true));
        driver
            .expect_send_message()
            .return_const(Err(DriverError::Operation("socket closed".into())));
        let gateway = gateway_with(Arc::new(driver), true);

        let err = gateway.send("11999990000", "hi").await.unwrap_err();
        assert!(matches!(err, MessagingError::DispatchError { .. }));
    }

    #[tokio::test]
    async fn registration_check_failure_maps_to_dispatch_error() {
        let mut driver = MockMessagingDriver::new();
        driver
            .expect_is_registered_user()
            .return_const(Err(DriverError::Protocol("target closed".into())));
        let gateway = gateway_with(Arc::new(driver), true);

        let err = gateway.send("11999990000", "hi").await.unwrap_err();
        assert!(matches!(err, MessagingError::DispatchError { .. }));
    }
}
