//! Per-connection driver: admission, then push forwarding until close.
//!
//! Each accepted connection gets its own Tokio task running this driver.
//! The flow is:
//!   1. Hand the peer to the hub → `Accept` or `Reject`
//!   2. On reject: abort the socket, no frame is ever written
//!   3. On accept: forward queued pushes until either side goes away

use std::sync::Arc;

use tokio::sync::mpsc;
use vigil_hub::{Admission, ConnectionState, HubError, Peer, PushHub};
use vigil_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::VigilError;

/// Drop guard that unregisters an admitted connection when the driver
/// exits.
///
/// This ensures cleanup happens even if the driver panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async hook.
struct RegistrationGuard<H: PushHub> {
    conn_id: ConnectionId,
    hub: Arc<H>,
}

impl<H: PushHub> Drop for RegistrationGuard<H> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let hub = Arc::clone(&self.hub);
        tokio::spawn(async move {
            hub.on_disconnect(conn_id).await;
        });
    }
}

fn advance(conn_id: ConnectionId, state: &mut ConnectionState, next: ConnectionState) {
    debug_assert!(state.can_transition_to(next), "{state} -> {next}");
    tracing::debug!(%conn_id, from = %state, to = %next, "connection state");
    *state = next;
}

/// Drives a single connection from accept to close.
///
/// Returns [`HubError::AuthorizationDenied`] for a rejected connection.
pub(crate) async fn drive_connection<H: PushHub>(
    conn: WebSocketConnection,
    hub: Arc<H>,
) -> Result<(), VigilError> {
    let conn_id = conn.id();
    let mut state = ConnectionState::Connecting;

    let (sender, mut outbound) = mpsc::unbounded_channel();
    let peer = Peer {
        id: conn_id,
        sender,
    };

    if hub.on_connect(peer, conn.context()).await == Admission::Reject {
        advance(conn_id, &mut state, ConnectionState::Rejected);
        conn.abort().await?;
        return Err(HubError::AuthorizationDenied(conn_id).into());
    }

    let _guard = RegistrationGuard {
        conn_id,
        hub: Arc::clone(&hub),
    };
    advance(conn_id, &mut state, ConnectionState::Active);

    loop {
        tokio::select! {
            Some(bytes) = outbound.recv() => {
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%conn_id, error = %e, "send failed");
                    break;
                }
            }
            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => {
                    tracing::debug!(%conn_id, len = data.len(), "ignoring inbound frame");
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
        }
    }

    advance(conn_id, &mut state, ConnectionState::Disconnected);
    // _guard drops here → hub forgets the connection.
    Ok(())
}
