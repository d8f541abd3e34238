//! Error types for the hub layer.

use vigil_protocol::ProtocolError;
use vigil_transport::ConnectionId;

/// Errors that can occur in hub operations.
///
/// None of these are ever sent to a client. A rejected connection sees a
/// silent disconnect; the reason only reaches the server log.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The authorization oracle refused the connection.
    #[error("connection {0} is not authorized")]
    AuthorizationDenied(ConnectionId),

    /// The connection is not registered with the hub.
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// Encoding a push failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
