use crate::core::session::SessionState;
use std::fmt;
use std::time::Duration;

/// Failures surfaced by session operations.
///
/// In-game command outcomes are never errors; they come back as a
/// [`CommandResult`](crate::core::session::CommandResult) category. Only
/// precondition violations and transport-level failures land here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// `connect()` outside `disconnected`.
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
    /// `disconnect()` while already `disconnected`.
    AlreadyDisconnected,
    SpawnTimeout(Duration),
    KickedDuringLogin(String),
    ConnectionEndedDuringLogin(String),
    /// Error reported by the game client, passed through verbatim.
    Protocol(String),
    EmptyCommand,
    /// Operation requires `ready`.
    NotReady(SessionState),
    NoConnection,
    /// The connected client does not provide a mode-specific capability.
    CapabilityUnavailable(&'static str),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidState { action, state } => write!(
                f,
                "Cannot {action}: session is currently '{state}'. Disconnect first."
            ),
            SessionError::AlreadyDisconnected => write!(f, "Bot is already disconnected."),
            SessionError::SpawnTimeout(timeout) => write!(
                f,
                "Timed out waiting for spawn after {}ms",
                timeout.as_millis()
            ),
            SessionError::KickedDuringLogin(reason) => {
                write!(f, "Kicked during login: {reason}")
            }
            SessionError::ConnectionEndedDuringLogin(reason) => {
                write!(f, "Connection ended during login: {reason}")
            }
            SessionError::Protocol(message) => f.write_str(message),
            SessionError::EmptyCommand => write!(f, "Command cannot be empty."),
            SessionError::NotReady(state) => {
                write!(f, "Bot is not ready (current state: '{state}').")
            }
            SessionError::NoConnection => write!(f, "No bot instance exists."),
            SessionError::CapabilityUnavailable(capability) => {
                write!(f, "{capability} is not available for this connection.")
            }
        }
    }
}

impl std::error::Error for SessionError {}
