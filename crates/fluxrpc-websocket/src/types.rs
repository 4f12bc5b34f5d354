//! Core types for the WebSocket session.

use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// A deferred connect request delivered to the session supervisor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Host name to resolve and present as the SNI / `Host` name.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Request target of the WebSocket upgrade (e.g. `/ws/api/v2`).
    pub target: String,
}

/// An RFC 6455 close status: numeric code plus human-readable text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseReason {
    /// Close status code.
    pub code: u16,
    /// Reason text sent in the close frame.
    pub reason: String,
}

/// The going-away close code (1001).
pub const GOING_AWAY: u16 = 1001;

impl CloseReason {
    /// Create a close reason from a code and text.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Convert into the wire-level close frame.
    pub fn into_frame(self) -> CloseFrame {
        CloseFrame {
            code: CloseCode::from(self.code),
            reason: self.reason.into(),
        }
    }
}

impl Default for CloseReason {
    fn default() -> Self {
        Self::new(GOING_AWAY, "")
    }
}

impl From<CloseFrame> for CloseReason {
    fn from(frame: CloseFrame) -> Self {
        Self {
            code: frame.code.into(),
            reason: frame.reason.to_string(),
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_close_reason_is_going_away() {
        let reason = CloseReason::default();
        assert_eq!(reason.code, GOING_AWAY);
        assert!(reason.reason.is_empty());
    }

    #[test]
    fn close_reason_round_trips_through_a_frame() {
        let reason = CloseReason::new(1000, "done");
        let frame = reason.clone().into_frame();
        assert_eq!(CloseReason::from(frame), reason);
    }
}
