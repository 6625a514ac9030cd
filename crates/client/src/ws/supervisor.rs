//! Reconnection supervisor.
//!
//! A pure transition function over [`SupervisorState`]. It performs no I/O:
//! every side effect is returned as an [`Effect`] for the session driver to
//! execute, in order. Whenever the phase changes the effect list starts with
//! [`Effect::CancelTimers`], so no timer outlives the phase that armed it.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Lifecycle phase of the notification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not connected and not trying to be.
    Idle,
    /// Socket opening or waiting for `auth_ok`.
    Connecting,
    /// Server acknowledged the credential; keep-alive running.
    Authenticated,
    /// Waiting for the reconnect timer of the given attempt (1-based).
    Reconnecting { attempt: u32 },
    /// Retry ceiling reached; only an explicit reset leaves this phase.
    GaveUp,
}

impl SessionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionPhase::Authenticated)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            SessionPhase::Connecting | SessionPhase::Reconnecting { .. }
        )
    }
}

/// Phase plus the count of reconnect attempts since the last authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorState {
    pub phase: SessionPhase,
    pub attempts: u32,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            attempts: 0,
        }
    }
}

/// Something that happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Caller asked to connect.
    Connect { has_credential: bool },
    /// The socket finished opening.
    Opened,
    /// Server answered the auth frame with `auth_ok`.
    AuthAcknowledged,
    /// Keep-alive interval elapsed.
    KeepAliveDue,
    /// The socket closed, errored, or failed to open.
    TransportClosed,
    /// The reconnect timer fired.
    ReconnectDue { has_credential: bool },
    /// Intentional shutdown (logout, unmount).
    Teardown,
    /// External retry trigger after giving up.
    Reset,
}

/// Work for the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop the keep-alive and reconnect timers.
    CancelTimers,
    /// Discard any previous socket and start opening a new one.
    OpenTransport,
    /// Discard the socket (and any pending open).
    CloseTransport,
    SendAuth,
    SendPing,
    StartKeepAlive,
    ScheduleReconnect(Duration),
    /// Drop the set of seen notification ids.
    ForgetSeenEvents,
}

/// Compute the next state and the effects that realize it.
pub fn transition(
    state: SupervisorState,
    input: Input,
    config: &ReconnectConfig,
) -> (SupervisorState, Vec<Effect>) {
    use Input::*;
    use SessionPhase::*;

    let (next, mut effects) = match (state.phase, input) {
        (Idle, Connect { has_credential: true }) => (
            SupervisorState {
                phase: Connecting,
                attempts: 0,
            },
            vec![Effect::OpenTransport],
        ),

        (Connecting, Opened) => (state, vec![Effect::SendAuth]),

        (Connecting, AuthAcknowledged) => (
            SupervisorState {
                phase: Authenticated,
                attempts: 0,
            },
            vec![Effect::StartKeepAlive],
        ),

        (Authenticated, KeepAliveDue) => (state, vec![Effect::SendPing]),

        (Connecting | Authenticated, TransportClosed) => {
            if state.attempts < config.max_attempts {
                let attempt = state.attempts + 1;
                (
                    SupervisorState {
                        phase: Reconnecting { attempt },
                        attempts: attempt,
                    },
                    vec![
                        Effect::CloseTransport,
                        Effect::ScheduleReconnect(config.delay_for_attempt(attempt)),
                    ],
                )
            } else {
                (
                    SupervisorState {
                        phase: GaveUp,
                        attempts: state.attempts,
                    },
                    vec![Effect::CloseTransport],
                )
            }
        }

        (Reconnecting { .. }, ReconnectDue { has_credential: true }) => (
            SupervisorState {
                phase: Connecting,
                attempts: state.attempts,
            },
            vec![Effect::OpenTransport],
        ),

        (Reconnecting { .. }, ReconnectDue { has_credential: false }) => {
            (SupervisorState::default(), Vec::new())
        }

        (_, Teardown) => (
            SupervisorState::default(),
            vec![Effect::CloseTransport, Effect::ForgetSeenEvents],
        ),

        (GaveUp, Reset) => (SupervisorState::default(), Vec::new()),

        // Everything else is stale or redundant: a connect while already
        // connecting, a late timer, a missing credential.
        _ => (state, Vec::new()),
    };

    if next.phase != state.phase {
        effects.insert(0, Effect::CancelTimers);
    }

    (next, effects)
}

/// Holds the current [`SupervisorState`] and applies [`transition`].
#[derive(Debug, Clone)]
pub struct Supervisor {
    state: SupervisorState,
    config: ReconnectConfig,
}

impl Supervisor {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: SupervisorState::default(),
            config,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn attempts(&self) -> u32 {
        self.state.attempts
    }

    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let (next, effects) = transition(self.state, input, &self.config);
        if next.phase != self.state.phase {
            crate::log_debug!(
                "Session phase {:?} -> {:?} on {:?}",
                self.state.phase,
                next.phase,
                input
            );
        }
        self.state = next;
        effects
    }
}
