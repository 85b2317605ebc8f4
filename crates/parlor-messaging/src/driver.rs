//! The messaging driver port.
//!
//! The driver is the external client that speaks the messaging platform's
//! web protocol through browser automation. This crate treats it as opaque
//! beyond the four operations and five events below: the supervisor calls
//! the operations and consumes the events from an unbounded channel the
//! driver writes into.
//!
//! [`StubDriver`] is a scripted in-process double used by the development
//! server and by tests; a production driver binds the same trait.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::state::ConnectedIdentity;

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Pairing payload issued by the driver while linking a new session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingCode {
    /// Opaque payload to render as a scannable code.
    pub raw: String,
    /// Optional short alphanumeric code the user can type instead.
    pub short_code: Option<String>,
}

/// Partial identity delivered with the `authenticated` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentitySeed {
    /// Platform identifier of the linked account.
    pub external_id: String,
    /// Display name if the driver already knows it.
    pub display_name: Option<String>,
}

impl From<IdentitySeed> for ConnectedIdentity {
    fn from(seed: IdentitySeed) -> Self {
        Self {
            external_id: seed.external_id,
            display_name: seed.display_name,
            phone_number: None,
        }
    }
}

/// Why the driver reported a disconnect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The operator logged the session out; never auto-reconnected.
    ExplicitLogout,
    /// Anything else (network drop, crashed automation driver, ...).
    Other(String),
}

/// Events the driver emits over its session's lifetime.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverEvent {
    /// A pairing code was issued; the operator must link the account.
    CodeIssued(PairingCode),
    /// Credentials were accepted; the session is linking.
    Authenticated(IdentitySeed),
    /// The session is usable. Carries the driver's snapshot of the
    /// connected account, which is also delivered when a trusted session
    /// resumes without a new pairing step.
    Ready(ConnectedIdentity),
    /// Credentials were rejected.
    AuthFailed(String),
    /// The link dropped.
    Disconnected(DisconnectReason),
}

/// Sender half of the driver event channel.
pub type DriverEventSender = mpsc::UnboundedSender<DriverEvent>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures reported by driver operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Startup was rejected.
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// The automation protocol broke mid-operation.
    #[error("protocol failure: {0}")]
    Protocol(String),
    /// Teardown failed.
    #[error("teardown failed: {0}")]
    Teardown(String),
    /// A send or registration check failed.
    #[error("operation failed: {0}")]
    Operation(String),
}

impl DriverError {
    /// Whether this error matches a known corrupted-session signature.
    ///
    /// The execution-context-destroyed class and protocol breakage both
    /// indicate the driver's local session storage is no longer usable.
    #[must_use]
    pub fn is_corruption_signature(&self) -> bool {
        match self {
            Self::Protocol(_) => true,
            Self::Initialization(message) | Self::Operation(message) | Self::Teardown(message) => {
                message.contains("Execution context was destroyed")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Port
// ─────────────────────────────────────────────────────────────────────────────

/// The driver operations the supervisor and gateway are allowed to invoke.
///
/// Implementations push [`DriverEvent`]s into the channel handed to them at
/// construction; the supervisor is the only consumer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingDriver: Send + Sync {
    /// Start the driver session. Readiness arrives asynchronously as events.
    async fn initialize(&self) -> Result<(), DriverError>;

    /// Tear the driver session down.
    async fn destroy(&self) -> Result<(), DriverError>;

    /// Send `body` to `address`, returning the driver-assigned message id.
    async fn send_message(&self, address: &str, body: &str) -> Result<String, DriverError>;

    /// Whether `address` has an account on the platform.
    async fn is_registered_user(&self, address: &str) -> Result<bool, DriverError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// StubDriver
// ─────────────────────────────────────────────────────────────────────────────

/// Scripted driver for development and tests.
///
/// `initialize` immediately issues a pairing code and, unless auto-ready is
/// disabled, follows with `Authenticated` and `Ready` as a trusted-session
/// resume would.
pub struct StubDriver {
    events: DriverEventSender,
    auto_ready: bool,
    next_init_error: Mutex<Option<DriverError>>,
    unregistered: RwLock<HashSet<String>>,
    init_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
}

impl StubDriver {
    /// Create a stub writing into `events`.
    #[must_use]
    pub fn new(events: DriverEventSender, auto_ready: bool) -> Arc<Self> {
        Arc::new(Self {
            events,
            auto_ready,
            next_init_error: Mutex::new(None),
            unregistered: RwLock::new(HashSet::new()),
            init_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Identity the stub reports when it reaches `Ready`.
    #[must_use]
    pub fn identity() -> ConnectedIdentity {
        ConnectedIdentity {
            external_id: "5511999990000@c.us".to_string(),
            display_name: Some("Parlor Dev".to_string()),
            phone_number: Some("5511999990000".to_string()),
        }
    }

    /// Fail the next `initialize` call with `error`.
    pub fn fail_next_initialize(&self, error: DriverError) {
        *self.next_init_error.lock() = Some(error);
    }

    /// Mark `address` as having no platform account.
    pub fn mark_unregistered(&self, address: &str) {
        let _ = self.unregistered.write().insert(address.to_string());
    }

    /// Number of `initialize` calls so far.
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of `destroy` calls so far.
    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    /// Messages accepted so far, as `(address, body)` pairs.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    fn emit(&self, event: DriverEvent) {
        // the receiver may already be gone during shutdown
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl MessagingDriver for StubDriver {
    async fn initialize(&self) -> Result<(), DriverError> {
        let _ = self.init_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_init_error.lock().take() {
            return Err(error);
        }
        self.emit(DriverEvent::CodeIssued(PairingCode {
            raw: "stub-pairing-payload".to_string(),
            short_code: Some("STUB-1234".to_string()),
        }));
        if self.auto_ready {
            self.emit(DriverEvent::Authenticated(IdentitySeed {
                external_id: Self::identity().external_id,
                display_name: Self::identity().display_name,
            }));
            self.emit(DriverEvent::Ready(Self::identity()));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), DriverError> {
        let _ = self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<String, DriverError> {
        self.sent
            .lock()
            .push((address.to_string(), body.to_string()));
        Ok(format!("stub-{}", uuid::Uuid::now_v7()))
    }

    async fn is_registered_user(&self, address: &str) -> Result<bool, DriverError> {
        Ok(!self.unregistered.read().contains(address))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
