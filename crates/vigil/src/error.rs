//! Unified error type for Vigil.

use vigil_hub::HubError;
use vigil_protocol::ProtocolError;
use vigil_session::SessionError;
use vigil_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `vigil` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A hub-level error (denied, unknown connection).
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A client session error (cache stopped).
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_transport::ConnectionId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::UpgradeFailed("bad upgrade".into());
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Transport(_)));
        assert!(vigil_err.to_string().contains("bad upgrade"));
    }

    #[test]
    fn test_from_hub_error() {
        let err = HubError::AuthorizationDenied(ConnectionId::new(3));
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Hub(_)));
        assert!(vigil_err.to_string().contains("conn-3"));
    }

    #[test]
    fn test_from_session_error() {
        let vigil_err: VigilError = SessionError::CacheClosed.into();
        assert!(matches!(vigil_err, VigilError::Session(_)));
    }
}
