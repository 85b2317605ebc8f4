//! The session state machine.
//!
//! [`SessionState`] is the authoritative in-memory record of the single
//! logical session. It is owned exclusively by the supervisor behind a
//! mutex; everything else sees clones or [`StatusSnapshot`]s.
//!
//! Transitions triggered by driver events live in [`SessionState::apply`],
//! a pure function returning the side [`Effect`]s the supervisor must run.
//! Keeping the transition table synchronous makes the state invariants
//! property-testable without a runtime.
//!
//! Invariants maintained by every transition:
//! - `identity` is non-empty iff status is `Authenticated` or `Ready`
//! - pairing artifacts are non-empty only in `AwaitingCode`
//! - `retry_count` resets to 0 on reaching `Ready` and on explicit logout

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::driver::{DisconnectReason, DriverEvent};

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Connection status of the logical messaging session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session established.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A pairing code has been issued and awaits the operator.
    AwaitingCode,
    /// Credentials accepted, session still linking.
    Authenticated,
    /// Fully usable; the only status in which dispatch is permitted.
    Ready,
    /// Authentication failed; terminal until an operator reconnects.
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::AwaitingCode => write!(f, "awaiting_code"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Identity of the account the driver session is linked to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedIdentity {
    /// Platform identifier (`<digits>@<host>` form).
    pub external_id: String,
    /// Display name if known.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Phone number if known.
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl ConnectedIdentity {
    /// The account's own phone number, derived from the external id when the
    /// driver did not report one directly.
    #[must_use]
    pub fn own_number(&self) -> Option<String> {
        if let Some(number) = &self.phone_number {
            return Some(number.clone());
        }
        let head = self.external_id.split('@').next()?;
        if head.is_empty() { None } else { Some(head.to_string()) }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Side effects the supervisor must run after a transition.
#[derive(Debug, PartialEq)]
pub(crate) enum Effect {
    /// Render and durably publish a pairing artifact.
    PublishArtifact(String),
    /// Clear the durable pairing artifact.
    ClearArtifacts,
    /// Abort any pending reconnect timer.
    CancelReconnect,
    /// Start the fixed-interval reconnect timer.
    ScheduleReconnect,
    /// A stale event arrived after an explicit logout; tear the driver down.
    TearDownDriver,
}

/// The authoritative session record. One per process.
#[derive(Clone, Debug)]
pub struct SessionState {
    /// Current connection status.
    pub status: SessionStatus,
    /// Automatic reconnect attempts made in the current outage.
    pub retry_count: u32,
    /// Short pairing code, present only while `AwaitingCode`.
    pub pairing_code: Option<String>,
    /// Raw scannable payload, present only while `AwaitingCode`.
    pub qr_payload: Option<String>,
    /// Linked account, present only in `Authenticated` / `Ready`.
    pub identity: Option<ConnectedIdentity>,
    /// Set by an explicit `disconnect()`; suppresses auto-reconnect and
    /// marks late driver events as stale until the next `connect()`.
    pub logout_requested: bool,
    /// Most recent terminal failure text, for status polling.
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            retry_count: 0,
            pairing_code: None,
            qr_payload: None,
            identity: None,
            logout_requested: false,
            last_error: None,
        }
    }
}

impl SessionState {
    fn clear_pairing(&mut self) {
        self.pairing_code = None;
        self.qr_payload = None;
    }

    fn clear_link(&mut self) {
        self.clear_pairing();
        self.identity = None;
    }

    /// Enter `Connecting` for a fresh attempt. The caller holds the state
    /// lock, which makes the surrounding check-and-set atomic.
    pub(crate) fn begin_connecting(&mut self) {
        self.status = SessionStatus::Connecting;
        self.logout_requested = false;
        self.last_error = None;
        self.clear_link();
    }

    /// Roll back a rejected initialization.
    pub(crate) fn fail_initialize(&mut self, message: &str) {
        if self.status == SessionStatus::Connecting {
            self.status = SessionStatus::Disconnected;
        }
        self.clear_link();
        self.last_error = Some(message.to_string());
    }

    /// Apply an explicit operator logout.
    pub(crate) fn reset_for_logout(&mut self) {
        self.status = SessionStatus::Disconnected;
        self.retry_count = 0;
        self.logout_requested = true;
        self.clear_link();
    }

    /// Apply a driver event and return the effects the supervisor must run.
    pub(crate) fn apply(&mut self, event: &DriverEvent, max_retries: u32) -> Vec<Effect> {
        match event {
            DriverEvent::CodeIssued(code) => {
                if self.status != SessionStatus::Connecting {
                    return Vec::new();
                }
                self.status = SessionStatus::AwaitingCode;
                self.qr_payload = Some(code.raw.clone());
                self.pairing_code = code.short_code.clone();
                vec![Effect::PublishArtifact(code.raw.clone())]
            }

            DriverEvent::Authenticated(seed) => {
                if !matches!(
                    self.status,
                    SessionStatus::Connecting | SessionStatus::AwaitingCode
                ) {
                    return Vec::new();
                }
                self.status = SessionStatus::Authenticated;
                self.identity = Some(seed.clone().into());
                self.clear_pairing();
                vec![Effect::ClearArtifacts]
            }

            DriverEvent::Ready(identity) => {
                if self.logout_requested {
                    // connect/disconnect raced an in-flight initialize; the
                    // operator's logout wins
                    return vec![Effect::TearDownDriver];
                }
                if self.status == SessionStatus::Failed {
                    return Vec::new();
                }
                self.status = SessionStatus::Ready;
                self.identity = Some(identity.clone());
                self.retry_count = 0;
                self.clear_pairing();
                vec![Effect::ClearArtifacts, Effect::CancelReconnect]
            }

            DriverEvent::AuthFailed(reason) => {
                self.status = SessionStatus::Failed;
                self.last_error = Some(reason.clone());
                self.clear_link();
                vec![Effect::ClearArtifacts, Effect::CancelReconnect]
            }

            DriverEvent::Disconnected(reason) => {
                self.status = SessionStatus::Disconnected;
                self.clear_link();
                let mut effects = vec![Effect::ClearArtifacts];
                let retryable = matches!(reason, DisconnectReason::Other(_))
                    && !self.logout_requested
                    && self.retry_count < max_retries;
                if retryable {
                    effects.push(Effect::ScheduleReconnect);
                }
                effects
            }
        }
    }

    /// Snapshot for status polling.
    pub(crate) fn snapshot(&self, max_retries: u32) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            connected: self.status == SessionStatus::Ready,
            connecting: self.status == SessionStatus::Connecting,
            has_qr_code: self.qr_payload.is_some(),
            has_pairing_code: self.pairing_code.is_some(),
            pairing_code: self.pairing_code.clone(),
            identity: self.identity.clone(),
            retry_count: self.retry_count,
            max_retries,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view of the session handed to status pollers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Current status.
    pub status: SessionStatus,
    /// Whether dispatch is currently permitted.
    pub connected: bool,
    /// Whether a connect attempt is in flight.
    pub connecting: bool,
    /// Whether a scannable artifact is available.
    pub has_qr_code: bool,
    /// Whether a short pairing code is available.
    pub has_pairing_code: bool,
    /// The short pairing code, if available.
    pub pairing_code: Option<String>,
    /// Linked account, if any.
    pub identity: Option<ConnectedIdentity>,
    /// Reconnect attempts made in the current outage.
    pub retry_count: u32,
    /// Cap on automatic reconnects.
    pub max_retries: u32,
    /// Most recent terminal failure text.
    pub last_error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{IdentitySeed, PairingCode};
    use proptest::prelude::*;

    const MAX_RETRIES: u32 = 3;

    fn code() -> DriverEvent {
        DriverEvent::CodeIssued(PairingCode {
            raw: "payload".into(),
            short_code: Some("AB-12".into()),
        })
    }

    fn authenticated() -> DriverEvent {
        DriverEvent::Authenticated(IdentitySeed {
            external_id: "5511999990000@c.us".into(),
            display_name: Some("Shop".into()),
        })
    }

    fn ready() -> DriverEvent {
        DriverEvent::Ready(ConnectedIdentity {
            external_id: "5511999990000@c.us".into(),
            display_name: Some("Shop".into()),
            phone_number: Some("5511999990000".into()),
        })
    }

    fn disconnected(reason: &str) -> DriverEvent {
        DriverEvent::Disconnected(DisconnectReason::Other(reason.into()))
    }

    // -- linear pairing chain --

    #[test]
    fn pairing_chain_reaches_ready() {
        let mut state = SessionState::default();
        state.begin_connecting();

        let effects = state.apply(&code(), MAX_RETRIES);
        assert_eq!(state.status, SessionStatus::AwaitingCode);
        assert_eq!(state.pairing_code.as_deref(), Some("AB-12"));
        assert_eq!(effects, vec![Effect::PublishArtifact("payload".into())]);

        let _ = state.apply(&authenticated(), MAX_RETRIES);
        assert_eq!(state.status, SessionStatus::Authenticated);
        assert!(state.identity.is_some());
        assert!(state.pairing_code.is_none());

        let effects = state.apply(&ready(), MAX_RETRIES);
        assert_eq!(state.status, SessionStatus::Ready);
        assert_eq!(state.retry_count, 0);
        assert!(effects.contains(&Effect::CancelReconnect));
    }

    #[test]
    fn trusted_resume_skips_pairing() {
        let mut state = SessionState::default();
        state.begin_connecting();
        let _ = state.apply(&ready(), MAX_RETRIES);
        assert_eq!(state.status, SessionStatus::Ready);
        assert!(state.identity.is_some());
    }

    #[test]
    fn code_issued_outside_connecting_is_ignored() {
        let mut state = SessionState::default();
        let effects = state.apply(&code(), MAX_RETRIES);
        assert!(effects.is_empty());
        assert_eq!(state.status, SessionStatus::Disconnected);
        assert!(state.pairing_code.is_none());
    }

    // -- disconnects and retry eligibility --

    #[test]
    fn transient_disconnect_schedules_reconnect() {
        let mut state = SessionState::default();
        state.begin_connecting();
        let _ = state.apply(&ready(), MAX_RETRIES);

        let effects = state.apply(&disconnected("stream errored"), MAX_RETRIES);
        assert_eq!(state.status, SessionStatus::Disconnected);
        assert!(state.identity.is_none());
        assert!(effects.contains(&Effect::ScheduleReconnect));
    }

    #[test]
    fn explicit_logout_disconnect_never_retries() {
        let mut state = SessionState::default();
        state.begin_connecting();
        let _ = state.apply(&ready(), MAX_RETRIES);

        let effects = state.apply(
            &DriverEvent::Disconnected(DisconnectReason::ExplicitLogout),
            MAX_RETRIES,
        );
        assert!(!effects.contains(&Effect::ScheduleReconnect));
    }

    #[test]
    fn exhausted_retries_stop_scheduling() {
        let mut state = SessionState::default();
        state.retry_count = MAX_RETRIES;
        let effects = state.apply(&disconnected("again"), MAX_RETRIES);
        assert!(!effects.contains(&Effect::ScheduleReconnect));
    }

    #[test]
    fn disconnect_after_logout_request_never_retries() {
        let mut state = SessionState::default();
        state.reset_for_logout();
        let effects = state.apply(&disconnected("late drop"), MAX_RETRIES);
        assert!(!effects.contains(&Effect::ScheduleReconnect));
    }

    // -- auth failure --

    #[test]
    fn auth_failure_is_terminal_and_clears_everything() {
        let mut state = SessionState::default();
        state.begin_connecting();
        let _ = state.apply(&code(), MAX_RETRIES);

        let effects = state.apply(&DriverEvent::AuthFailed("bad creds".into()), MAX_RETRIES);
        assert_eq!(state.status, SessionStatus::Failed);
        assert!(state.identity.is_none());
        assert!(state.pairing_code.is_none());
        assert_eq!(state.last_error.as_deref(), Some("bad creds"));
        assert!(effects.contains(&Effect::CancelReconnect));
    }

    #[test]
    fn ready_is_ignored_while_failed() {
        let mut state = SessionState::default();
        let _ = state.apply(&DriverEvent::AuthFailed("bad".into()), MAX_RETRIES);
        let effects = state.apply(&ready(), MAX_RETRIES);
        assert!(effects.is_empty());
        assert_eq!(state.status, SessionStatus::Failed);
    }

    // -- logout reconciliation --

    #[test]
    fn late_ready_after_logout_requests_teardown() {
        let mut state = SessionState::default();
        state.reset_for_logout();
        let effects = state.apply(&ready(), MAX_RETRIES);
        assert_eq!(effects, vec![Effect::TearDownDriver]);
        assert_eq!(state.status, SessionStatus::Disconnected);
        assert!(state.identity.is_none());
    }

    #[test]
    fn connect_after_logout_clears_the_marker() {
        let mut state = SessionState::default();
        state.reset_for_logout();
        state.begin_connecting();
        assert!(!state.logout_requested);
    }

    // -- identity helpers --

    #[test]
    fn own_number_prefers_reported_number() {
        let identity = ConnectedIdentity {
            external_id: "123@c.us".into(),
            display_name: None,
            phone_number: Some("456".into()),
        };
        assert_eq!(identity.own_number().as_deref(), Some("456"));
    }

    #[test]
    fn own_number_falls_back_to_external_id() {
        let identity = ConnectedIdentity {
            external_id: "5511999990000@c.us".into(),
            display_name: None,
            phone_number: None,
        };
        assert_eq!(identity.own_number().as_deref(), Some("5511999990000"));
    }

    // -- invariant, property-checked over random sequences --

    proptest! {
        #[test]
        fn identity_present_iff_authenticated_or_ready(ops in proptest::collection::vec(0u8..8, 0..64)) {
            let mut state = SessionState::default();
            for op in ops {
                match op {
                    0 => { let _ = state.apply(&code(), MAX_RETRIES); }
                    1 => { let _ = state.apply(&authenticated(), MAX_RETRIES); }
                    2 => { let _ = state.apply(&ready(), MAX_RETRIES); }
                    3 => { let _ = state.apply(&DriverEvent::AuthFailed("x".into()), MAX_RETRIES); }
                    4 => { let _ = state.apply(&disconnected("drop"), MAX_RETRIES); }
                    5 => {
                        let _ = state.apply(
                            &DriverEvent::Disconnected(DisconnectReason::ExplicitLogout),
                            MAX_RETRIES,
                        );
                    }
                    6 => {
                        // connect() guard: only non-Ready, non-Connecting states
                        // start a fresh attempt
                        if !matches!(state.status, SessionStatus::Ready | SessionStatus::Connecting) {
                            state.begin_connecting();
                        }
                    }
                    _ => state.reset_for_logout(),
                }

                let linked = matches!(
                    state.status,
                    SessionStatus::Authenticated | SessionStatus::Ready
                );
                prop_assert_eq!(state.identity.is_some(), linked);
                prop_assert!(
                    state.pairing_code.is_none() || state.status == SessionStatus::AwaitingCode
                );
                prop_assert!(
                    state.qr_payload.is_none() || state.status == SessionStatus::AwaitingCode
                );
            }
        }
    }
}
