//! # parlor-messaging
//!
//! The messaging session lifecycle manager: everything between the HTTP
//! surface and the browser-automation driver that speaks the messaging
//! platform's web protocol.
//!
//! - **[`driver`]**: the [`driver::MessagingDriver`] port, the
//!   [`driver::DriverEvent`] stream, and a scripted stub for development.
//! - **[`state`]**: the session state machine ([`state::SessionState`]) and
//!   its pure event-transition function.
//! - **[`pairing`]**: renders pairing codes into scannable artifacts and
//!   exposes the latest one to polling operators.
//! - **[`recovery`]**: best-effort cleanup of corrupted driver session
//!   storage, plus the operator-only full wipe.
//! - **[`supervisor`]**: [`supervisor::SessionSupervisor`] owns the single
//!   driver instance, serializes connect attempts, consumes driver events,
//!   and drives the fixed-interval reconnect loop.
//! - **[`dispatch`]**: [`dispatch::DispatchGateway`], the only path by which
//!   outbound messages leave the system.
//!
//! ## Concurrency model
//!
//! One logical session per process. Driver events arrive on an unbounded
//! channel consumed by a single supervisor task, so no two events are
//! handled concurrently. `connect()` performs its `Connecting` check-and-set
//! under the state mutex, making it safe to race with the reconnect timer
//! and with other callers.

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod pairing;
pub mod recovery;
pub mod state;
pub mod supervisor;

pub use config::MessagingConfig;
pub use dispatch::{DeliveryReceipt, DispatchGateway};
pub use driver::{DriverEvent, MessagingDriver};
pub use error::MessagingError;
pub use state::{ConnectedIdentity, SessionStatus, StatusSnapshot};
pub use supervisor::{ConnectOutcome, SessionSupervisor};
