//! Connection lifecycle as seen by the hub.

use std::fmt;

/// The lifecycle state of one push connection.
///
/// ```text
/// Connecting ──(oracle: false)──→ Rejected
///     │
///     └──(oracle: true)──→ Active ──(transport close)──→ Disconnected
/// ```
///
/// There is no way back from `Rejected` or `Disconnected`. A client that
/// reconnects is a brand-new connection and starts at `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Rejected,
    Active,
    Disconnected,
}

impl ConnectionState {
    /// Returns `true` for states that can never be left.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Disconnected)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Rejected)
                | (Self::Connecting, Self::Active)
                | (Self::Active, Self::Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "Connecting",
            Self::Rejected => "Rejected",
            Self::Active => "Active",
            Self::Disconnected => "Disconnected",
        };
        f.write_str(name)
    }
}
