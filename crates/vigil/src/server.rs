//! `HubServer` builder and accept loop.
//!
//! This is the entry point for running a Vigil notification hub. It ties
//! together all the layers: transport → gate → broadcast hub.

use std::sync::Arc;
use std::time::Duration;

use vigil_hub::{
    AuthorizationOracle, BroadcastHub, ConnectionGate, HubError, PrivilegedHub,
};
use vigil_transport::{
    PendingConnection, PendingWebSocket, Transport, WebSocketTransport,
};

use crate::handler::drive_connection;
use crate::{AdminFeed, VigilError};

/// Builder for configuring and starting a hub server.
///
/// # Example
///
/// ```rust,ignore
/// use vigil::prelude::*;
///
/// let server = HubServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .upgrade_timeout(Duration::from_secs(5))
///     .build(SessionOracle::new(directory))
///     .await?;
/// let feed = server.feed();
/// tokio::spawn(server.run());
/// ```
pub struct HubServerBuilder {
    bind_addr: String,
    upgrade_timeout: Duration,
}

impl HubServerBuilder {
    /// Default bound on a single peer's upgrade handshake.
    pub const DEFAULT_UPGRADE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            upgrade_timeout: Self::DEFAULT_UPGRADE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a peer may take to finish its upgrade handshake
    /// before the socket is dropped.
    pub fn upgrade_timeout(mut self, timeout: Duration) -> Self {
        self.upgrade_timeout = timeout;
        self
    }

    /// Binds the listener and puts a fresh broadcast hub behind `oracle`.
    pub async fn build<O: AuthorizationOracle>(
        self,
        oracle: O,
    ) -> Result<HubServer<O>, VigilError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let hub = BroadcastHub::new();
        let feed = AdminFeed::new(hub.clone());
        let gate = Arc::new(ConnectionGate::new(oracle, hub));

        tracing::info!(addr = %self.bind_addr, "hub server bound");
        Ok(HubServer {
            transport,
            gate,
            feed,
            upgrade_timeout: self.upgrade_timeout,
        })
    }
}

impl Default for HubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound hub server.
///
/// Call [`run()`](Self::run) to start accepting connections. Grab a
/// [`feed()`](Self::feed) first to publish while it runs.
pub struct HubServer<O> {
    transport: WebSocketTransport,
    gate: Arc<PrivilegedHub<O>>,
    feed: AdminFeed,
    upgrade_timeout: Duration,
}

impl<O: AuthorizationOracle> HubServer<O> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A publishing handle that stays valid while the server runs.
    pub fn feed(&self) -> AdminFeed {
        self.feed.clone()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted peer gets its own task that performs the upgrade
    /// handshake under the configured timeout and then drives the
    /// connection, so a slow or silent peer never holds up the loop. Runs
    /// until the process is terminated.
    pub async fn run(mut self) -> Result<(), VigilError> {
        tracing::info!("hub server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let gate = Arc::clone(&self.gate);
                    let upgrade_timeout = self.upgrade_timeout;
                    tokio::spawn(serve_peer(pending, gate, upgrade_timeout));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn serve_peer<O: AuthorizationOracle>(
    pending: PendingWebSocket,
    gate: Arc<PrivilegedHub<O>>,
    upgrade_timeout: Duration,
) {
    let addr = pending.remote_addr();
    let conn = match tokio::time::timeout(upgrade_timeout, pending.upgrade()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%addr, error = %e, "upgrade failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%addr, ?upgrade_timeout, "upgrade timed out");
            return;
        }
    };

    match drive_connection(conn, gate).await {
        Ok(()) => {}
        Err(VigilError::Hub(HubError::AuthorizationDenied(id))) => {
            tracing::debug!(conn_id = %id, "connection aborted");
        }
        Err(e) => {
            tracing::debug!(error = %e, "connection ended with error");
        }
    }
}
