//! Error taxonomy for the messaging session lifecycle.
//!
//! Every caller-facing operation returns one of these variants in its error
//! position; nothing in this crate panics on a failure path. Recovery
//! failures are deliberately absent: they are logged and swallowed inside
//! [`crate::recovery`] and never surface to callers.

use thiserror::Error;

use crate::state::SessionStatus;

/// Failures surfaced by the supervisor and the dispatch gateway.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MessagingError {
    /// A connect was requested while one is already running. Not worth
    /// retrying; poll status instead.
    #[error("a connection attempt is already in progress")]
    AlreadyInProgress,

    /// The driver rejected startup outright.
    #[error("driver rejected initialization: {message}")]
    InitializationError {
        /// Driver-reported failure text.
        message: String,
    },

    /// Credentials were rejected. Terminal for the cycle; an operator must
    /// re-trigger `connect()`.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Driver-reported reason.
        reason: String,
    },

    /// An outbound send was attempted while the session is not `Ready`.
    #[error("session is not ready to send (status: {status})")]
    NotReady {
        /// Status at the time of the attempt.
        status: SessionStatus,
    },

    /// The recipient normalizes to fewer than the minimum digit count.
    #[error("invalid recipient {input:?}: fewer than 10 digits")]
    InvalidRecipient {
        /// The recipient as entered.
        input: String,
    },

    /// The normalized address has no account on the messaging platform.
    #[error("recipient {address} is not registered on the platform")]
    UnregisteredRecipient {
        /// The normalized address that was checked.
        address: String,
    },

    /// The driver failed to deliver. Never retried here; pacing and retry
    /// policy belong to the caller.
    #[error("dispatch failed: {message}")]
    DispatchError {
        /// Driver-reported failure text.
        message: String,
    },
}
