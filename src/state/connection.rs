//! Tunnel connection state machine types.

use std::fmt;

/// Tunnel connection state machine.
///
/// Exactly one connection per daemon process may be outside
/// `Idle`/`Disconnected` at a time; concurrent connect attempts are
/// rejected, not queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TunnelState {
    /// No connection attempt has been made.
    #[default]
    Idle,
    /// Connection attempt in progress.
    Connecting,
    /// Tunnel established, routes and DNS programmed.
    Connected,
    /// Pause requested, tunnel being torn down while keeping intent to resume.
    Pausing,
    /// Tunnel torn down, waiting for a resume request.
    Paused,
    /// Waiting for connectivity, or a fresh connect sequence is required.
    Reconnecting,
    /// Disconnect in progress.
    Disconnecting,
    /// Fully torn down after a connect attempt.
    Disconnected,
    /// Unrecoverable error; partial state has been torn down.
    Failed,
}

impl TunnelState {
    /// Terminal states end the event stream of a connect attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Connected | Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Pausing => "PAUSING",
            Self::Paused => "PAUSED",
            Self::Reconnecting => "RECONNECTING",
            Self::Disconnecting => "DISCONNECTING",
            Self::Disconnected => "DISCONNECTED",
            Self::Failed => "FAILED",
        };
        write!(f, "{name}")
    }
}

/// A single entry of the ordered state-event stream delivered to the
/// caller of a connect operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateEvent {
    pub state: TunnelState,
    /// Human-readable reason for the transition.
    pub reason: String,
}

impl StateEvent {
    #[must_use]
    pub fn new(state: TunnelState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.state)
        } else {
            write!(f, "{} ({})", self.state, self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(TunnelState::default(), TunnelState::Idle);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TunnelState::Connected.is_terminal());
        assert!(TunnelState::Disconnected.is_terminal());
        assert!(TunnelState::Failed.is_terminal());
        assert!(!TunnelState::Connecting.is_terminal());
        assert!(!TunnelState::Paused.is_terminal());
        assert!(!TunnelState::Reconnecting.is_terminal());
    }

    #[test]
    fn test_event_display_with_reason() {
        let event = StateEvent::new(TunnelState::Reconnecting, "No connectivity");
        assert_eq!(event.to_string(), "RECONNECTING (No connectivity)");
    }

    #[test]
    fn test_event_display_without_reason() {
        let event = StateEvent::new(TunnelState::Connected, "");
        assert_eq!(event.to_string(), "CONNECTED");
    }
}
