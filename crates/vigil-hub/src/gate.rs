//! Connect-time privilege gate composed in front of any [`PushHub`].

use vigil_transport::{ConnectionContext, ConnectionId};

use crate::{Admission, AuthorizationOracle, BroadcastHub, Peer, PushHub};

/// Wraps a [`PushHub`] so that only administrators get through.
///
/// Every call to `on_connect` asks the oracle afresh. Nothing about the
/// answer is remembered, so a caller whose privilege is revoked keeps an
/// already-admitted connection but cannot open a new one.
#[derive(Debug, Clone)]
pub struct ConnectionGate<O, H> {
    oracle: O,
    inner: H,
}

/// The administrator notification hub: a broadcast hub behind a gate.
pub type PrivilegedHub<O> = ConnectionGate<O, BroadcastHub>;

impl<O: AuthorizationOracle, H: PushHub> ConnectionGate<O, H> {
    /// Puts `inner` behind `oracle`.
    pub fn new(oracle: O, inner: H) -> Self {
        Self { oracle, inner }
    }

    /// Returns the wrapped hub.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<O: AuthorizationOracle, H: PushHub> PushHub for ConnectionGate<O, H> {
    async fn on_connect(&self, peer: Peer, ctx: &ConnectionContext) -> Admission {
        if !self.oracle.has_admin(ctx).await {
            tracing::info!(
                conn_id = %peer.id,
                remote = ?ctx.remote_addr(),
                "connection rejected"
            );
            return Admission::Reject;
        }
        self.inner.on_connect(peer, ctx).await
    }

    async fn on_disconnect(&self, id: ConnectionId) {
        self.inner.on_disconnect(id).await
    }
}
